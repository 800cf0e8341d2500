use super::types::Voice;

/// Viseme type that asks the engine for 3D blend-shape animation
pub const FACIAL_EXPRESSION_VISEME: &str = "FacialExpression";

/// Build the SSML document for one text.
///
/// The text is XML-escaped; voice names and language codes come from
/// settings and are inserted as given.
pub fn build_ssml(text: &str, voice: &Voice) -> String {
    format!(
        concat!(
            r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" "#,
            r#"xmlns:mstts="http://www.w3.org/2001/mstts" xml:lang="{lang}">"#,
            r#"<voice name="{voice}">"#,
            r#"<mstts:viseme type="{viseme}"/>"#,
            "{text}",
            "</voice></speak>"
        ),
        lang = voice.language_code,
        voice = voice.name,
        viseme = FACIAL_EXPRESSION_VISEME,
        text = escape_xml(text),
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
