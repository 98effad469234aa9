//! Provider capabilities consumed by the pipeline.
//!
//! Backends (hosted moderation APIs, local classifiers, chat models) live
//! outside this crate. The pipeline only needs text in and a raw JSON
//! payload out; normalization happens in [`crate::normalize`].

use serde_json::Value;

/// Classifies a piece of text and returns the provider's raw payload.
///
/// The payload is expected to look like a moderation response
/// (`{"results": [{"flagged": .., "categories": {..}, "category_scores": {..}}]}`)
/// but any JSON is accepted.
pub trait Classifier {
    /// # Errors
    ///
    /// Returns the provider's failure unchanged.
    fn classify(&self, text: &str) -> anyhow::Result<Value>;
}

/// Generates an answer for a prompt and returns the provider's raw payload.
///
/// `text` and `model` keys are read from the payload when present.
pub trait Generator {
    /// # Errors
    ///
    /// Returns the provider's failure unchanged.
    fn generate(&self, text: &str) -> anyhow::Result<Value>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> anyhow::Result<Value>,
{
    fn classify(&self, text: &str) -> anyhow::Result<Value> {
        self(text)
    }
}

impl<F> Generator for F
where
    F: Fn(&str) -> anyhow::Result<Value>,
{
    fn generate(&self, text: &str) -> anyhow::Result<Value> {
        self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl Generator for Echo {
        fn generate(&self, text: &str) -> anyhow::Result<Value> {
            Ok(json!({ "text": text, "model": "echo" }))
        }
    }

    #[test]
    fn closures_act_as_classifiers() {
        let classifier = |text: &str| -> anyhow::Result<Value> { Ok(json!({ "seen": text })) };
        let payload = Classifier::classify(&classifier, "hi").unwrap();
        assert_eq!(payload["seen"], "hi");
    }

    #[test]
    fn trait_objects_are_usable() {
        let generator: Box<dyn Generator> = Box::new(Echo);
        assert_eq!(generator.generate("x").unwrap()["model"], "echo");
    }
}
