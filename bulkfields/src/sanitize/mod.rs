// Text sanitizing for configured keys, defaults and submitted field values

use regex::Regex;
use std::sync::OnceLock;

fn script_blocks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>")
            .expect("static regex")
    })
}

fn tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\r\n\t ]+").expect("static regex"))
}

/// Reduce free text to a single clean line: markup is stripped (script and
/// style bodies included), line breaks and tabs become spaces, whitespace
/// runs collapse and the result is trimmed.
///
/// Applying it twice gives the same result as applying it once.
pub fn sanitize_text(input: &str) -> String {
    let mut text = input.to_string();
    if text.contains('<') {
        text = script_blocks().replace_all(&text, "").into_owned();
        text = tags().replace_all(&text, "").into_owned();
    }
    whitespace_runs()
        .replace_all(&text, " ")
        .trim()
        .to_string()
}
