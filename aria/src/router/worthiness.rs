//! Code-worthiness classification
//!
//! Decides whether an unmatched utterance describes a programmatic task worth
//! synthesizing a throwaway program for, or conversational text for the
//! fallback responder. Reuses the phrase-embedding machinery against a second
//! catalog of task anchors, OR'd with a small imperative-verb rule so short
//! commands ("sort these numbers") do not depend on anchor coverage alone.

use std::sync::Arc;

use super::catalog::normalize;
use super::embedding::{cosine_similarity, Embedder};
use super::RouterError;

/// Anchor phrases for programmatic tasks, one per task family.
const TASK_ANCHORS: &[&str] = &[
    "create a bar chart showing sales data for different months",
    "plot a sine wave with different colors",
    "generate a scatter plot of random data points",
    "read a csv file and display the first rows",
    "create a text file with sample data",
    "list all files in the current directory",
    "count the number of lines in a file",
    "fetch data from a json api and display it",
    "scrape a website and extract all links",
    "download an image from a url",
    "make an http request and show the response",
    "calculate the factorial of a number",
    "solve a quadratic equation",
    "generate prime numbers up to one hundred",
    "calculate the fibonacci sequence",
    "perform matrix multiplication",
    "get system information like cpu and memory usage",
    "check disk space usage",
    "list running processes",
    "sort a list of numbers in ascending order",
    "find the maximum and minimum values in a dataset",
    "calculate the average of a list of numbers",
    "convert data between different formats",
    "resize an image to specific dimensions",
    "convert an image to grayscale",
    "create a simple linear regression model",
    "calculate correlation between two datasets",
    "ping a website and show response time",
    "check if a port is open on localhost",
    "count words in a text string",
    "remove punctuation from text",
    "create a simple sqlite database",
    "query data from a database",
    "generate a random password",
    "simulate a coin flip",
    "create a timer that counts down",
    "generate a qr code",
    "encrypt and decrypt text",
    "compress and decompress data",
    "create a log file with timestamps",
];

/// Leading imperative verbs that strongly suggest a programmatic task
const TASK_VERBS: &[&str] = &[
    "create", "generate", "write", "calculate", "compute", "plot", "draw", "build", "parse",
    "convert", "sort", "count", "fetch", "download", "scrape", "resize", "encrypt", "decrypt",
    "compress", "simulate", "solve", "extract",
];

/// Stateless classifier: programmatic task vs conversational text
pub struct CodeWorthinessClassifier {
    anchors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl CodeWorthinessClassifier {
    /// Embed the anchor set once
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f32) -> Result<Self, RouterError> {
        let anchors = TASK_ANCHORS
            .iter()
            .map(|phrase| embedder.embed(phrase))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            anchors,
            embedder,
            threshold,
        })
    }

    /// Pure decision: should this utterance go to the synthesis pipeline?
    pub fn is_code_worthy(&self, utterance: &str) -> Result<bool, RouterError> {
        let normalized = normalize(utterance);
        if normalized.is_empty() {
            return Ok(false);
        }

        if let Some(first_word) = normalized.split_whitespace().next() {
            if TASK_VERBS.contains(&first_word) {
                return Ok(true);
            }
        }

        let query = self.embedder.embed(&normalized)?;
        let best = self
            .anchors
            .iter()
            .map(|anchor| cosine_similarity(&query, anchor))
            .fold(0.0_f32, f32::max);
        Ok(best >= self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::HashEmbedder;

    fn classifier() -> CodeWorthinessClassifier {
        CodeWorthinessClassifier::new(Arc::new(HashEmbedder::default()), 0.5).unwrap()
    }

    #[test]
    fn test_programmatic_tasks_accepted() {
        let c = classifier();
        assert!(c.is_code_worthy("calculate the factorial of a number").unwrap());
        assert!(c.is_code_worthy("create a histogram of normally distributed data").unwrap());
        assert!(c.is_code_worthy("sort these numbers for me").unwrap());
    }

    #[test]
    fn test_conversational_rejected() {
        let c = classifier();
        assert!(!c.is_code_worthy("what do you think about pizza").unwrap());
        assert!(!c.is_code_worthy("how are you today").unwrap());
        assert!(!c.is_code_worthy("tell me a joke").unwrap());
        assert!(!c.is_code_worthy("").unwrap());
    }

    #[test]
    fn test_verb_rule_fires_without_anchor_coverage() {
        let c = classifier();
        // No anchor mentions morse code; the leading verb decides
        assert!(c.is_code_worthy("convert this sentence to morse code").unwrap());
    }
}
