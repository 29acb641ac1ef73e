/// A fixed role instruction plus the task text placed before the source.
#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    pub system: &'static str,
    pub task: &'static str,
}

impl Prompt {
    pub fn input_for(&self, content: &str) -> String {
        format!("{}\n\n{}", self.task, content)
    }
}

pub const SUMMARY: Prompt = Prompt {
    system: "You are a helpful assistant that creates concise summaries of educational content.",
    task: "Please provide a concise summary of the following content:",
};

pub const KEY_POINTS: Prompt = Prompt {
    system: "You are a helpful assistant that extracts key points from educational content.",
    task: "Please extract 5-7 key points from the following content. Return them as a JSON array of strings and nothing else:",
};

pub const QUIZ: Prompt = Prompt {
    system: "You are a helpful assistant that creates multiple choice quiz questions.",
    task: "Please create 3 multiple choice quiz questions based on the following content. Return them as a JSON array of objects with 'question', 'options' (array of strings) and 'correctAnswer' fields, where 'correctAnswer' is copied exactly from 'options'. Return nothing else:",
};
