mod common;

use std::time::Duration;

use content_analysis::{
    AnalysisError,
    pipeline::SourceKind,
    storage::{BlobStorage, KvStorage, blob_key},
};

use common::{
    Reply, ScriptedGenerator, ScriptedTranscripts, TranscriptScript, harness,
    harness_with_timeout, harness_with_unflushable_store, pdf_with_pages,
};

fn no_captions() -> ScriptedTranscripts {
    ScriptedTranscripts::new(TranscriptScript::Segments(Vec::new()))
}

#[tokio::test]
async fn document_analysis_produces_and_stores_a_record() -> anyhow::Result<()> {
    let h = harness(ScriptedGenerator::well_formed(), no_captions()).await?;
    let pdf = pdf_with_pages(&["Plants use sunlight", "Chlorophyll is green"]);

    let record = h.pipeline.analyze_document(&pdf, "biology.pdf").await?;

    assert_eq!(record.source_kind(), SourceKind::Document);
    assert_eq!(record.file_name(), Some("biology.pdf"));
    assert_eq!(record.source_url(), None);
    assert!(record.summary.starts_with("Summary of:"));
    assert!(record.summary.contains("Plants use sunlight"));
    assert!(record.summary.contains("Chlorophyll is green"));
    assert_eq!(
        record.key_points,
        vec!["Plants convert light", "Chlorophyll absorbs light"]
    );
    assert_eq!(record.quiz.len(), 1);
    assert_eq!(h.generator.calls(), 3);

    let stored = h.pipeline.get_analysis(&record.id).await?;
    assert_eq!(stored, record);
    assert_eq!(
        h.blobs.read(&blob_key(&record.id)).await?.as_deref(),
        Some(pdf.as_slice())
    );
    Ok(())
}

#[tokio::test]
async fn pages_are_analyzed_in_order() -> anyhow::Result<()> {
    let h = harness(ScriptedGenerator::well_formed(), no_captions()).await?;
    let pdf = pdf_with_pages(&["first page", "second page", "third page"]);

    let record = h.pipeline.analyze_document(&pdf, "ordered.pdf").await?;

    let first = record.summary.find("first page").expect("first page present");
    let second = record.summary.find("second page").expect("second page present");
    let third = record.summary.find("third page").expect("third page present");
    assert!(first < second && second < third);
    Ok(())
}

#[tokio::test]
async fn malformed_document_fails_extraction_without_backend_calls() -> anyhow::Result<()> {
    let h = harness(ScriptedGenerator::well_formed(), no_captions()).await?;

    let err = h
        .pipeline
        .analyze_document(b"%PDF-garbage", "broken.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Extraction(_)));
    assert_eq!(h.generator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn document_without_pages_fails_extraction() -> anyhow::Result<()> {
    let h = harness(ScriptedGenerator::well_formed(), no_captions()).await?;

    let err = h
        .pipeline
        .analyze_document(&pdf_with_pages(&[]), "empty.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Extraction(msg) if msg.contains("no pages")));
    assert_eq!(h.generator.calls(), 0);
    assert!(h.records.get_all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn page_without_text_is_still_analyzed() -> anyhow::Result<()> {
    let h = harness(ScriptedGenerator::well_formed(), no_captions()).await?;

    let record = h
        .pipeline
        .analyze_document(&pdf_with_pages(&[""]), "blank.pdf")
        .await?;

    assert_eq!(h.generator.calls(), 3);
    for input in h.generator.inputs() {
        let (_, source) = input.split_once("\n\n").expect("prompt and source");
        assert!(source.trim().is_empty(), "{input:?}");
    }
    assert!(record.summary.starts_with("Summary of:"));
    assert_eq!(h.pipeline.get_analysis(&record.id).await?, record);
    Ok(())
}

#[tokio::test]
async fn video_analysis_uses_the_transcript_in_timeline_order() -> anyhow::Result<()> {
    let transcripts = ScriptedTranscripts::captions(&[
        ("and then it rains", 4.0),
        ("clouds gather first", 1.0),
    ]);
    let h = harness(ScriptedGenerator::well_formed(), transcripts).await?;
    let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42";

    let record = h.pipeline.analyze_video(url).await?;

    assert_eq!(record.source_kind(), SourceKind::Video);
    assert_eq!(record.source_url(), Some(url));
    assert_eq!(record.file_name(), None);
    assert_eq!(
        record.summary,
        "Summary of: clouds gather first\nand then it rains"
    );
    assert_eq!(h.transcripts.requested(), vec!["dQw4w9WgXcQ"]);
    assert!(!h.blobs.exists(&blob_key(&record.id)).await?);
    assert_eq!(h.pipeline.get_analysis(&record.id).await?, record);
    Ok(())
}

#[tokio::test]
async fn short_and_embed_links_resolve_to_the_same_video() -> anyhow::Result<()> {
    let h = harness(
        ScriptedGenerator::well_formed(),
        ScriptedTranscripts::captions(&[("hello", 0.0)]),
    )
    .await?;

    h.pipeline.analyze_video("https://youtu.be/dQw4w9WgXcQ").await?;
    h.pipeline
        .analyze_video("https://www.youtube.com/embed/dQw4w9WgXcQ")
        .await?;

    assert_eq!(h.transcripts.requested(), vec!["dQw4w9WgXcQ", "dQw4w9WgXcQ"]);
    Ok(())
}

#[tokio::test]
async fn unrecognized_url_is_rejected_before_any_remote_call() -> anyhow::Result<()> {
    let h = harness(
        ScriptedGenerator::well_formed(),
        ScriptedTranscripts::captions(&[("hello", 0.0)]),
    )
    .await?;

    for url in ["https://vimeo.com/12345", "not a url", ""] {
        let err = h.pipeline.analyze_video(url).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidReference(_)), "{url}");
    }

    assert!(h.transcripts.requested().is_empty());
    assert_eq!(h.generator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_transcript_is_reported_without_backend_calls() -> anyhow::Result<()> {
    let h = harness(
        ScriptedGenerator::well_formed(),
        ScriptedTranscripts::new(TranscriptScript::Unavailable("captions are disabled")),
    )
    .await?;

    let err = h
        .pipeline
        .analyze_video("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap_err();

    match err {
        AnalysisError::TranscriptUnavailable { video_id, reason } => {
            assert_eq!(video_id, "dQw4w9WgXcQ");
            assert_eq!(reason, "captions are disabled");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.generator.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn transcript_transport_failure_is_retryable() -> anyhow::Result<()> {
    let h = harness(
        ScriptedGenerator::well_formed(),
        ScriptedTranscripts::new(TranscriptScript::Transport("connection reset")),
    )
    .await?;

    let err = h
        .pipeline
        .analyze_video("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::SourceUnavailable(_)));
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn unparseable_key_points_fall_back_to_raw_text() -> anyhow::Result<()> {
    let raw = "Plants need light. Also water.";
    let generator = ScriptedGenerator::new(
        Reply::Echo("Summary of"),
        Reply::text(raw),
        Reply::text(r#"[{"question":"Q?","options":["A","B"],"correctAnswer":"A"}]"#),
    );
    let h = harness(generator, no_captions()).await?;
    let pdf = pdf_with_pages(&["light and water"]);

    let record = h.pipeline.analyze_document(&pdf, "plants.pdf").await?;

    assert_eq!(record.key_points, vec![raw.to_string()]);
    assert_eq!(record.quiz.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unparseable_quiz_falls_back_to_empty() -> anyhow::Result<()> {
    let generator = ScriptedGenerator::new(
        Reply::Echo("Summary of"),
        Reply::text(r#"["one", "two"]"#),
        Reply::text("I could not come up with questions."),
    );
    let h = harness(generator, no_captions()).await?;
    let pdf = pdf_with_pages(&["nothing quizzable"]);

    let record = h.pipeline.analyze_document(&pdf, "dull.pdf").await?;

    assert!(record.quiz.is_empty());
    assert!(!record.summary.is_empty());
    assert_eq!(record.key_points, vec!["one", "two"]);
    Ok(())
}

#[tokio::test]
async fn stored_quiz_answers_are_always_among_the_options() -> anyhow::Result<()> {
    let quiz = r#"```json
[
  {"question": "Largest planet?", "options": ["Mars", "Jupiter"], "correctAnswer": "jupiter"},
  {"question": "Hottest planet?", "options": ["Venus", "Mercury"], "correctAnswer": "Pluto"},
  {"question": "Red planet?", "options": ["Mars", "Earth"], "correctAnswer": "Mars"}
]
```"#;
    let generator = ScriptedGenerator::new(
        Reply::Echo("Summary of"),
        Reply::text(r#"["planets"]"#),
        Reply::text(quiz),
    );
    let h = harness(generator, no_captions()).await?;
    let pdf = pdf_with_pages(&["the solar system"]);

    let record = h.pipeline.analyze_document(&pdf, "planets.pdf").await?;

    assert!(!record.quiz.is_empty());
    for item in &record.quiz {
        assert!(item.options.contains(&item.correct_answer), "{item:?}");
    }
    assert!(record.quiz.iter().all(|item| item.question != "Hottest planet?"));

    let stored = h.pipeline.get_analysis(&record.id).await?;
    for item in &stored.quiz {
        assert!(item.options.contains(&item.correct_answer), "{item:?}");
    }
    Ok(())
}

#[tokio::test]
async fn backend_failure_fails_the_analysis_and_stores_nothing() -> anyhow::Result<()> {
    let generator = ScriptedGenerator::new(
        Reply::Fail("401 invalid api key".to_string()),
        Reply::text("[]"),
        Reply::text("[]"),
    );
    let h = harness(generator, no_captions()).await?;
    let pdf = pdf_with_pages(&["anything"]);

    let err = h
        .pipeline
        .analyze_document(&pdf, "anything.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::AnalysisBackend(msg) if msg.contains("invalid api key")));
    assert!(h.records.get_all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn store_failure_after_analysis_leaves_nothing_behind() -> anyhow::Result<()> {
    let h = harness_with_unflushable_store(ScriptedGenerator::well_formed(), no_captions()).await?;
    let pdf = pdf_with_pages(&["Plants use sunlight"]);

    let err = h
        .pipeline
        .analyze_document(&pdf, "biology.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Store(_)), "{err:?}");
    assert!(!err.to_string().contains(h.dir.path().to_string_lossy().as_ref()), "{err}");
    assert_eq!(h.generator.calls(), 3);
    assert!(h.records.get_all().await?.is_empty());
    assert_eq!(std::fs::read_dir(h.blobs.dir())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn empty_summary_is_a_backend_failure() -> anyhow::Result<()> {
    let generator = ScriptedGenerator::new(
        Reply::text("   "),
        Reply::text(r#"["a"]"#),
        Reply::text("[]"),
    );
    let h = harness(generator, no_captions()).await?;

    let err = h
        .pipeline
        .analyze_video("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::AnalysisBackend(_)));
    Ok(())
}

#[tokio::test]
async fn stalled_backend_times_out() -> anyhow::Result<()> {
    let generator = ScriptedGenerator::new(Reply::Hang, Reply::text("[]"), Reply::text("[]"));
    let h = harness_with_timeout(
        generator,
        ScriptedTranscripts::captions(&[("hello", 0.0)]),
        Duration::from_millis(50),
    )
    .await?;

    let err = h
        .pipeline
        .analyze_video("https://youtu.be/dQw4w9WgXcQ")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::AnalysisBackend(msg) if msg.contains("timed out")));
    Ok(())
}

#[tokio::test]
async fn unknown_id_is_not_found() -> anyhow::Result<()> {
    let h = harness(ScriptedGenerator::well_formed(), no_captions()).await?;

    let err = h.pipeline.get_analysis("no-such-id").await.unwrap_err();

    assert!(matches!(err, AnalysisError::NotFound(_)));
    assert!(!err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn concurrent_analyses_do_not_mix_sources() -> anyhow::Result<()> {
    let h = harness(ScriptedGenerator::well_formed(), no_captions()).await?;
    let first = pdf_with_pages(&["alpha document text"]);
    let second = pdf_with_pages(&["omega document text"]);

    let (a, b) = tokio::try_join!(
        h.pipeline.analyze_document(&first, "alpha.pdf"),
        h.pipeline.analyze_document(&second, "omega.pdf"),
    )?;

    assert_ne!(a.id, b.id);
    assert!(a.summary.contains("alpha") && !a.summary.contains("omega"));
    assert!(b.summary.contains("omega") && !b.summary.contains("alpha"));

    let stored_a = h.pipeline.get_analysis(&a.id).await?;
    let stored_b = h.pipeline.get_analysis(&b.id).await?;
    assert_eq!(stored_a.file_name(), Some("alpha.pdf"));
    assert_eq!(stored_b.file_name(), Some("omega.pdf"));
    assert_eq!(
        h.blobs.read(&blob_key(&a.id)).await?.as_deref(),
        Some(first.as_slice())
    );
    assert_eq!(
        h.blobs.read(&blob_key(&b.id)).await?.as_deref(),
        Some(second.as_slice())
    );
    Ok(())
}
