#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use content_analysis::{
    ai::{GenerationRequest, TextGenerator, prompts},
    pipeline::{
        AnalysisPipeline, AnalyzerConfig, ContentAnalyzer, PdfTextExtractor, TranscriptError,
        TranscriptFetcher, TranscriptSegment,
    },
    storage::{
        AnalysisStore, BlobStorage, FsBlobStorage, FsBlobStorageConfig, JsonKvStorage,
        JsonKvStorageConfig, KvStorage, StorageResult,
    },
};
use serde_json::Value;
use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use tempfile::TempDir;

/// Builds an uncompressed PDF with one page per entry, each showing its text
/// in Courier.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 14.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Echoes the source text back, prefixed with the given label.
    Echo(&'static str),
    Fail(String),
    Hang,
}

impl Reply {
    pub fn text(value: impl Into<String>) -> Self {
        Reply::Text(value.into())
    }
}

/// Answers each of the three analysis prompts with a scripted reply.
pub struct ScriptedGenerator {
    pub summary: Reply,
    pub key_points: Reply,
    pub quiz: Reply,
    calls: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(summary: Reply, key_points: Reply, quiz: Reply) -> Self {
        Self {
            summary,
            key_points,
            quiz,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn well_formed() -> Self {
        Self::new(
            Reply::Echo("Summary of"),
            Reply::text(r#"["Plants convert light", "Chlorophyll absorbs light"]"#),
            Reply::text(
                r#"[{"question":"What absorbs light?","options":["Chlorophyll","Water","Soil"],"correctAnswer":"Chlorophyll"}]"#,
            ),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().expect("inputs lock").clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .lock()
            .expect("inputs lock")
            .push(request.input.to_string());

        let reply = if request.instructions == prompts::SUMMARY.system {
            &self.summary
        } else if request.instructions == prompts::KEY_POINTS.system {
            &self.key_points
        } else if request.instructions == prompts::QUIZ.system {
            &self.quiz
        } else {
            return Err(anyhow!("unexpected instructions: {}", request.instructions));
        };

        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Echo(label) => {
                let source = request
                    .input
                    .split_once("\n\n")
                    .map(|(_, source)| source)
                    .unwrap_or_default();
                Ok(format!("{label}: {source}"))
            }
            Reply::Fail(message) => Err(anyhow!(message.clone())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(anyhow!("unreachable"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum TranscriptScript {
    Segments(Vec<TranscriptSegment>),
    Unavailable(&'static str),
    Transport(&'static str),
}

pub struct ScriptedTranscripts {
    script: TranscriptScript,
    requested: Mutex<Vec<String>>,
}

impl ScriptedTranscripts {
    pub fn new(script: TranscriptScript) -> Self {
        Self {
            script,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn captions(lines: &[(&str, f64)]) -> Self {
        let segments = lines
            .iter()
            .map(|(text, start)| TranscriptSegment {
                text: text.to_string(),
                start: *start,
                duration: 1.5,
            })
            .collect();
        Self::new(TranscriptScript::Segments(segments))
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().expect("requested lock").clone()
    }
}

#[async_trait]
impl TranscriptFetcher for ScriptedTranscripts {
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        self.requested
            .lock()
            .expect("requested lock")
            .push(video_id.to_string());
        match &self.script {
            TranscriptScript::Segments(segments) => Ok(segments.clone()),
            TranscriptScript::Unavailable(reason) => {
                Err(TranscriptError::Unavailable(reason.to_string()))
            }
            TranscriptScript::Transport(reason) => {
                Err(TranscriptError::Transport(reason.to_string()))
            }
        }
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub pipeline: Arc<AnalysisPipeline>,
    pub generator: Arc<ScriptedGenerator>,
    pub transcripts: Arc<ScriptedTranscripts>,
    pub records: Arc<JsonKvStorage>,
    pub blobs: Arc<FsBlobStorage>,
}

pub fn kv_config(dir: &TempDir) -> JsonKvStorageConfig {
    JsonKvStorageConfig {
        working_dir: dir.path().into(),
        namespace: "analyses".to_string(),
        workspace: None,
    }
}

pub fn blob_config(dir: &TempDir) -> FsBlobStorageConfig {
    FsBlobStorageConfig {
        working_dir: dir.path().into(),
        namespace: "source_blobs".to_string(),
        workspace: None,
    }
}

pub async fn open_store(dir: &TempDir) -> Result<(AnalysisStore, Arc<JsonKvStorage>, Arc<FsBlobStorage>)> {
    let records = Arc::new(JsonKvStorage::new(kv_config(dir)));
    records.initialize().await?;
    let blobs = Arc::new(FsBlobStorage::new(blob_config(dir)));
    blobs.initialize().await?;
    let store = AnalysisStore::new(records.clone(), blobs.clone());
    Ok((store, records, blobs))
}

pub async fn harness(generator: ScriptedGenerator, transcripts: ScriptedTranscripts) -> Result<Harness> {
    harness_with_timeout(generator, transcripts, Duration::from_secs(5)).await
}

pub async fn harness_with_timeout(
    generator: ScriptedGenerator,
    transcripts: ScriptedTranscripts,
    request_timeout: Duration,
) -> Result<Harness> {
    let dir = TempDir::new()?;
    let (store, records, blobs) = open_store(&dir).await?;
    assemble(dir, store, records, blobs, generator, transcripts, request_timeout)
}

/// Record collection whose flushes to disk always fail.
pub struct UnflushableKv {
    pub inner: Arc<JsonKvStorage>,
}

#[async_trait]
impl KvStorage for UnflushableKv {
    async fn initialize(&self) -> StorageResult<()> {
        self.inner.initialize().await
    }

    async fn finalize(&self) -> StorageResult<()> {
        self.sync_if_dirty().await
    }

    async fn upsert(&self, records: HashMap<String, Value>) -> StorageResult<()> {
        self.inner.upsert(records).await
    }

    async fn delete(&self, ids: &[String]) -> StorageResult<()> {
        self.inner.delete(ids).await
    }

    async fn drop_all(&self) -> StorageResult<()> {
        self.inner.drop_all().await
    }

    async fn get_all(&self) -> StorageResult<HashMap<String, Value>> {
        self.inner.get_all().await
    }

    async fn get_by_id(&self, id: &str) -> StorageResult<Option<Value>> {
        self.inner.get_by_id(id).await
    }

    async fn sync_if_dirty(&self) -> StorageResult<()> {
        let path = self.inner.file_path().display().to_string();
        Err(anyhow!("No space left on device").context(format!("failed to write {path}")))
    }
}

/// Harness whose record collection accepts writes but cannot persist them.
pub async fn harness_with_unflushable_store(
    generator: ScriptedGenerator,
    transcripts: ScriptedTranscripts,
) -> Result<Harness> {
    let dir = TempDir::new()?;
    let (_, records, blobs) = open_store(&dir).await?;
    let failing = Arc::new(UnflushableKv {
        inner: records.clone(),
    });
    let store = AnalysisStore::new(failing, blobs.clone());
    assemble(dir, store, records, blobs, generator, transcripts, Duration::from_secs(5))
}

fn assemble(
    dir: TempDir,
    store: AnalysisStore,
    records: Arc<JsonKvStorage>,
    blobs: Arc<FsBlobStorage>,
    generator: ScriptedGenerator,
    transcripts: ScriptedTranscripts,
    request_timeout: Duration,
) -> Result<Harness> {
    let generator = Arc::new(generator);
    let transcripts = Arc::new(transcripts);

    let analyzer = ContentAnalyzer::new(
        generator.clone(),
        AnalyzerConfig {
            model: "test-model".to_string(),
            request_timeout,
        },
    );
    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(PdfTextExtractor::new()),
        transcripts.clone(),
        analyzer,
        store,
    ));

    Ok(Harness {
        dir,
        pipeline,
        generator,
        transcripts,
        records,
        blobs,
    })
}
