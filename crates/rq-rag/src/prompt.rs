//! Prompt templates used by the pipeline
//!
//! Author: hephaex@gmail.com

use rq_core::{Document, PromptTemplate, TemplateError};

/// Wraps the user's question before it reaches the QA chain
pub const HR_DIRECTOR_TEMPLATE: &str = "Assume you are a Human Resources Director. According to the resumes, answer this question: {question}";

/// "Stuff" prompt: every context document is placed ahead of the question
pub const STUFF_QA_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n{context}\n\nQuestion: {question}\nHelpful Answer:";

/// Separator between stuffed documents
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

pub fn hr_director_prompt() -> Result<PromptTemplate, TemplateError> {
    PromptTemplate::new(HR_DIRECTOR_TEMPLATE, ["question"])
}

pub fn stuff_qa_prompt() -> Result<PromptTemplate, TemplateError> {
    PromptTemplate::new(STUFF_QA_TEMPLATE, ["context", "question"])
}

/// Join document contents into a single context block
pub fn format_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
