//! Small-talk detection.
//!
//! Classification and response selection are pure functions of the message
//! text; a casual message skips retrieval entirely.

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hiya",
    "howdy",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
    "yo",
    "sup",
];

const CASUAL_PHRASES: &[&str] = &[
    "how are you",
    "thank",
    "bye",
    "goodbye",
    "what can you do",
    "who are you",
    "help",
    "nice to meet you",
];

const GREETING_RESPONSE: &str =
    "Hello! Upload a document and ask me anything about its contents.";
const WELLBEING_RESPONSE: &str =
    "I'm doing well, thanks for asking! What would you like to know about your documents?";
const CAPABILITIES_RESPONSE: &str = "I answer questions about the documents you upload. \
     Upload a PDF, text, Markdown or HTML file, then ask about its contents and I'll cite \
     the pages my answer comes from.";
const THANKS_RESPONSE: &str = "You're welcome! Let me know if you have more questions.";
const FAREWELL_RESPONSE: &str = "Goodbye! Come back any time you have questions about your documents.";
const GENERIC_RESPONSE: &str =
    "I'm here to help with your documents. What would you like to know?";

/// Decides whether a message is small talk and picks its canned reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasualClassifier {
    /// Treat messages of at most two words without digits as casual.
    pub short_message_heuristic: bool,
}

impl Default for CasualClassifier {
    fn default() -> Self {
        Self {
            short_message_heuristic: true,
        }
    }
}

impl CasualClassifier {
    pub fn new(short_message_heuristic: bool) -> Self {
        Self {
            short_message_heuristic,
        }
    }

    /// Whether `text` is small talk. Any matching rule makes it casual.
    pub fn classify(&self, text: &str) -> bool {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return false;
        }

        is_greeting(&normalized)
            || CASUAL_PHRASES.iter().any(|p| normalized.contains(p))
            || (self.short_message_heuristic && is_short_message(&normalized))
    }

    /// Canned reply for a casual message.
    pub fn respond(&self, text: &str) -> &'static str {
        canned_response(text)
    }
}

/// Pick a canned reply by keyword priority.
pub fn canned_response(text: &str) -> &'static str {
    let normalized = normalize(text);

    if is_greeting(&normalized) {
        GREETING_RESPONSE
    } else if normalized.contains("how are you") {
        WELLBEING_RESPONSE
    } else if ["what can you do", "help", "who are you"]
        .iter()
        .any(|p| normalized.contains(p))
    {
        CAPABILITIES_RESPONSE
    } else if normalized.contains("thank") {
        THANKS_RESPONSE
    } else if normalized.contains("bye") {
        FAREWELL_RESPONSE
    } else {
        GENERIC_RESPONSE
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Exact greeting, or a greeting followed by a space, `!` or `,`.
fn is_greeting(normalized: &str) -> bool {
    GREETINGS.iter().any(|greeting| {
        normalized == *greeting
            || normalized
                .strip_prefix(greeting)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|next| matches!(next, ' ' | '!' | ','))
    })
}

fn is_short_message(normalized: &str) -> bool {
    normalized.split_whitespace().count() <= 2 && !normalized.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings() {
        let classifier = CasualClassifier::default();
        assert!(classifier.classify("hi"));
        assert!(classifier.classify("Hello!"));
        assert!(classifier.classify("hey, can you summarize chapter three for me please"));
        assert!(classifier.classify("Good morning there, what does the report conclude overall"));
    }

    #[test]
    fn test_greeting_prefix_requires_separator() {
        assert!(!is_greeting("history of the pump"));
        assert!(!is_greeting("hint about section"));
        assert!(is_greeting("hi there"));
    }

    #[test]
    fn test_casual_phrases() {
        let classifier = CasualClassifier::new(false);
        assert!(classifier.classify("Thanks a lot for the summary"));
        assert!(classifier.classify("ok goodbye for now then"));
        assert!(classifier.classify("What can you do with my files?"));
    }

    #[test]
    fn test_short_message_heuristic() {
        let classifier = CasualClassifier::default();
        assert!(classifier.classify("warranty terms"));
        assert!(!classifier.classify("page 5"));
        assert!(!classifier.classify("What is the warranty period for the pump?"));
    }

    #[test]
    fn test_heuristic_can_be_disabled() {
        let classifier = CasualClassifier::new(false);
        assert!(!classifier.classify("warranty terms"));
        assert!(classifier.classify("hi"));
    }

    #[test]
    fn test_blank_is_not_casual() {
        assert!(!CasualClassifier::default().classify("   "));
    }

    #[test]
    fn test_response_priority() {
        assert_eq!(canned_response("hello, how are you?"), GREETING_RESPONSE);
        assert_eq!(canned_response("so how are you today"), WELLBEING_RESPONSE);
        assert_eq!(canned_response("thanks, can you help"), CAPABILITIES_RESPONSE);
        assert_eq!(canned_response("thank you"), THANKS_RESPONSE);
        assert_eq!(canned_response("goodbye"), FAREWELL_RESPONSE);
        assert_eq!(canned_response("cool beans"), GENERIC_RESPONSE);
    }

    #[test]
    fn test_classification_is_pure() {
        let classifier = CasualClassifier::default();
        for text in ["hi", "page 5", "thanks!", "what is covered by the warranty"] {
            assert_eq!(classifier.classify(text), classifier.classify(text));
            assert_eq!(classifier.respond(text), classifier.respond(text));
        }
    }
}
