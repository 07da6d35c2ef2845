//! Scene-analysis prompt, reply parsing and OCR instruction selection.
//!
//! The classifier asks the model for a small JSON object describing the
//! frame. [`SceneAnalysis::parse`] accepts the reply bare or wrapped in a
//! Markdown code fence. [`SceneAnalysis::instruction`] turns a positive
//! analysis into an OCR instruction tailored to the kind of page.

use serde::Deserialize;

use super::ClassifierError;

// ---------------------------------------------------------------------------
// Analysis prompt
// ---------------------------------------------------------------------------

pub const ANALYSIS_PROMPT: &str = "\
Analyse this image carefully and answer the following questions in JSON:

1. Does the image contain any text (any language, digits included)?
2. What kind of scene is it? (e.g. book, open book, PDF page, business card,
   poster, street, landscape, indoor, object)
3. If it contains text, where in the image does the text appear? (e.g. whole
   page, top half, centre, inside a table)
4. If it contains text, what kind of text is it? (e.g. printed, handwritten,
   heading, body text, table, label)
5. How confident are you? (high, medium, low)

Reply with this JSON object only, no other text:
{
  \"has_text\": true/false,
  \"scene_type\": \"scene type\",
  \"scene_description\": \"detailed description of the scene\",
  \"text_regions\": \"where the text is (if any)\",
  \"text_type\": \"kind of text (if any)\",
  \"confidence\": \"high/medium/low\"
}";

// ---------------------------------------------------------------------------
// SceneAnalysis
// ---------------------------------------------------------------------------

/// The model's description of one frame. Missing fields default to empty,
/// and a missing `has_text` means "no text".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SceneAnalysis {
    pub has_text: bool,
    pub scene_type: String,
    pub scene_description: String,
    pub text_regions: String,
    pub text_type: String,
    pub confidence: String,
}

impl SceneAnalysis {
    /// Parse a model reply, stripping a surrounding code fence if present.
    pub fn parse(reply: &str) -> Result<Self, ClassifierError> {
        serde_json::from_str(strip_code_fence(reply))
            .map_err(|e| ClassifierError::Parse(format!("{e} in reply {reply:?}")))
    }

    /// OCR instruction for a frame that contains text.
    pub fn instruction(&self) -> String {
        let scene = self.scene_type.to_lowercase();
        let text = self.text_type.to_lowercase();

        let body = if scene.contains("book") {
            "This is a page from a book. Recognise all the text on the page, \
             keeping the original paragraphs and line breaks."
                .to_string()
        } else if scene.contains("pdf") || scene.contains("document") {
            "This is a PDF or document page. Recognise all the text on the page.".to_string()
        } else if scene.contains("card") {
            "This is a business card. Recognise every field on the card, including \
             name, title, company, phone number and email."
                .to_string()
        } else if scene.contains("table") || text.contains("table") {
            "The image contains a table. Recognise all of its contents and keep the \
             table structure where possible."
                .to_string()
        } else if scene.contains("poster") || text.contains("heading") || text.contains("title") {
            "This is a poster or heading. Recognise all the text, keeping the \
             hierarchy between headings and body text."
                .to_string()
        } else if text.contains("handwrit") {
            "The image contains handwriting. Recognise the handwritten content as \
             well as possible."
                .to_string()
        } else if scene.contains("label") {
            "This is a label or sign. Recognise all the text and information on it.".to_string()
        } else {
            format!(
                "This image ({}) contains text. Recognise all the text in the image.",
                self.scene_type
            )
        };

        let mut instruction = format!("<image>\n{body}");
        let regions = self.text_regions.trim();
        if !regions.is_empty() && regions != "N/A" {
            instruction.push_str(&format!(" The text is mainly located: {regions}."));
        }
        instruction
    }

    /// Why OCR is skipped for a frame without text.
    pub fn skip_reason(&self) -> String {
        let scene = if self.scene_type.trim().is_empty() {
            "unknown"
        } else {
            self.scene_type.trim()
        };
        format!("no text in image (scene: {scene})")
    }
}

/// Body of a ```` ```json ```` (or bare ```` ``` ````) fence, else the
/// trimmed reply.
fn strip_code_fence(reply: &str) -> &str {
    let inner = if let Some((_, rest)) = reply.split_once("```json") {
        rest
    } else if let Some((_, rest)) = reply.split_once("```") {
        rest
    } else {
        return reply.trim();
    };
    inner.split("```").next().unwrap_or(inner).trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(scene: &str, text_type: &str, regions: &str) -> SceneAnalysis {
        SceneAnalysis {
            has_text: true,
            scene_type: scene.into(),
            text_type: text_type.into(),
            text_regions: regions.into(),
            ..SceneAnalysis::default()
        }
    }

    #[test]
    fn parses_bare_json() {
        let a = SceneAnalysis::parse(r#"{"has_text": true, "scene_type": "book"}"#).unwrap();
        assert!(a.has_text);
        assert_eq!(a.scene_type, "book");
        assert!(a.text_regions.is_empty());
    }

    #[test]
    fn parses_json_fence() {
        let reply = "Here you go:\n```json\n{\"has_text\": false, \"scene_type\": \"street\"}\n```\nThanks";
        let a = SceneAnalysis::parse(reply).unwrap();
        assert!(!a.has_text);
        assert_eq!(a.scene_type, "street");
    }

    #[test]
    fn parses_bare_fence() {
        let reply = "```\n{\"has_text\": true, \"scene_type\": \"poster\"}\n```";
        assert_eq!(SceneAnalysis::parse(reply).unwrap().scene_type, "poster");
    }

    #[test]
    fn missing_has_text_means_no_text() {
        assert!(!SceneAnalysis::parse(r#"{"scene_type": "wall"}"#).unwrap().has_text);
    }

    #[test]
    fn non_json_reply_is_parse_error() {
        assert!(matches!(
            SceneAnalysis::parse("I think there is text."),
            Err(ClassifierError::Parse(_))
        ));
    }

    #[test]
    fn instruction_by_scene_type() {
        let cases = [
            ("Open book", "", "page from a book"),
            ("PDF page", "", "PDF or document"),
            ("Business card", "", "business card"),
            ("spreadsheet", "table", "contains a table"),
            ("Poster", "", "poster or heading"),
            ("sticky note", "handwritten", "handwriting"),
            ("shipping label", "", "label or sign"),
        ];
        for (scene, text_type, expected) in cases {
            let instruction = analysis(scene, text_type, "").instruction();
            assert!(instruction.starts_with("<image>\n"), "{scene}: {instruction}");
            assert!(instruction.contains(expected), "{scene}: {instruction}");
        }
    }

    #[test]
    fn book_wins_over_later_rules() {
        let instruction = analysis("book with a table", "handwritten", "").instruction();
        assert!(instruction.contains("page from a book"));
    }

    #[test]
    fn generic_instruction_names_the_scene() {
        let instruction = analysis("whiteboard", "printed", "").instruction();
        assert!(instruction.contains("(whiteboard)"));
    }

    #[test]
    fn text_regions_hint_is_appended() {
        let instruction = analysis("book", "", "top half").instruction();
        assert!(instruction.ends_with(" The text is mainly located: top half."));

        let instruction = analysis("book", "", "N/A").instruction();
        assert!(!instruction.contains("mainly located"));
    }

    #[test]
    fn skip_reason_names_the_scene() {
        let mut a = analysis("landscape", "", "");
        a.has_text = false;
        assert_eq!(a.skip_reason(), "no text in image (scene: landscape)");
        assert_eq!(
            SceneAnalysis::default().skip_reason(),
            "no text in image (scene: unknown)"
        );
    }
}
