//! Text sanitization for feed titles and descriptions.

/// Some feeds put the whole post in the description; keep stored text bounded.
const MAX_SANITIZED_BYTES: usize = 2048;

/// Strip all HTML from `raw`, unescape entities, normalize whitespace, and
/// cap the result at 2048 bytes.
///
/// The cap counts bytes, not graphemes; the cut backs off to the nearest
/// character boundary so the output stays valid UTF-8.
pub fn sanitize(raw: &str) -> String {
    // Empty allow-list: every tag goes, text content stays.
    let stripped = ammonia::Builder::empty().clean(raw).to_string();

    // The cleaner escapes what it keeps; bring entities back to text.
    let unescaped = html_escape::decode_html_entities(&stripped);

    let mut text = unescaped.trim().replace('\n', " ");

    if text.len() > MAX_SANITIZED_BYTES {
        let mut end = MAX_SANITIZED_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }

    text
}
