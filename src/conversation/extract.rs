//! Keyword-table context extraction from free text.

use super::ContextMap;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const DEVICE_TYPE: &str = "device_type";
pub const VENDOR: &str = "vendor";
pub const OS: &str = "os";
pub const ERROR_CODE: &str = "error_code";
pub const PROGRAMMING_LANGUAGE: &str = "programming_language";
pub const CATEGORY: &str = "category";

/// (keyword, value). Multi-word keywords match as phrases.
type Table = &'static [(&'static str, &'static str)];

const DEVICE_TYPES: Table = &[
    ("laptop", "laptop"),
    ("notebook", "laptop"),
    ("macbook", "laptop"),
    ("thinkpad", "laptop"),
    ("desktop", "desktop"),
    ("pc", "desktop"),
    ("iphone", "phone"),
    ("phone", "phone"),
    ("smartphone", "phone"),
    ("ipad", "tablet"),
    ("tablet", "tablet"),
    ("printer", "printer"),
    ("router", "router"),
    ("modem", "router"),
    ("monitor", "monitor"),
    ("keyboard", "keyboard"),
    ("mouse", "mouse"),
    ("headphones", "headphones"),
    ("earbuds", "headphones"),
    ("server", "server"),
];

const VENDORS: Table = &[
    ("apple", "apple"),
    ("macbook", "apple"),
    ("iphone", "apple"),
    ("ipad", "apple"),
    ("imac", "apple"),
    ("dell", "dell"),
    ("hp", "hp"),
    ("lenovo", "lenovo"),
    ("thinkpad", "lenovo"),
    ("asus", "asus"),
    ("acer", "acer"),
    ("microsoft", "microsoft"),
    ("surface", "microsoft"),
    ("samsung", "samsung"),
    ("galaxy", "samsung"),
    ("pixel", "google"),
    ("sony", "sony"),
    ("logitech", "logitech"),
    ("netgear", "netgear"),
    ("tp-link", "tp-link"),
    ("cisco", "cisco"),
    ("canon", "canon"),
    ("epson", "epson"),
    ("brother", "brother"),
];

const OPERATING_SYSTEMS: Table = &[
    ("windows", "windows"),
    ("win10", "windows"),
    ("win11", "windows"),
    ("macos", "macos"),
    ("mac os", "macos"),
    ("osx", "macos"),
    ("ventura", "macos"),
    ("sonoma", "macos"),
    ("linux", "linux"),
    ("ubuntu", "linux"),
    ("debian", "linux"),
    ("fedora", "linux"),
    ("android", "android"),
    ("ios", "ios"),
    ("chromeos", "chromeos"),
];

const PROGRAMMING_LANGUAGES: Table = &[
    ("typescript", "typescript"),
    ("javascript", "javascript"),
    ("node", "javascript"),
    ("react", "javascript"),
    ("python", "python"),
    ("traceback", "python"),
    ("rust", "rust"),
    ("cargo", "rust"),
    ("java", "java"),
    ("kotlin", "kotlin"),
    ("golang", "go"),
    ("c#", "csharp"),
    ("c++", "cpp"),
    ("php", "php"),
    ("ruby", "ruby"),
    ("swift", "swift"),
    ("sql", "sql"),
    ("excel", "excel"),
    ("vlookup", "excel"),
    ("google sheets", "sheets"),
];

const CATEGORIES: Table = &[
    ("stack trace", "programming"),
    ("traceback", "programming"),
    ("exception", "programming"),
    ("undefined", "programming"),
    ("null pointer", "programming"),
    ("compile", "programming"),
    ("syntax", "programming"),
    ("function", "programming"),
    ("formula", "spreadsheet"),
    ("spreadsheet", "spreadsheet"),
    ("vlookup", "spreadsheet"),
    ("excel", "spreadsheet"),
    ("wifi", "network"),
    ("wi-fi", "network"),
    ("internet", "network"),
    ("ethernet", "network"),
    ("bluetooth", "network"),
    ("connect", "network"),
    ("connection", "network"),
    ("vpn", "network"),
    ("dns", "network"),
    ("printer", "printing"),
    ("print", "printing"),
    ("password", "account"),
    ("login", "account"),
    ("log in", "account"),
    ("sign in", "account"),
    ("2fa", "account"),
    ("battery", "hardware"),
    ("screen", "hardware"),
    ("overheating", "hardware"),
    ("fan", "hardware"),
    ("turn on", "hardware"),
    ("install", "software"),
    ("update", "software"),
    ("crash", "software"),
    ("crashes", "software"),
    ("freeze", "software"),
    ("freezes", "software"),
];

static ERROR_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(0x[0-9a-f]{4,8}|E\d{3,5}|[A-Z]{2,10}-\d{2,6}|error\s+(?:code\s+)?\d{2,5})\b",
    )
    .unwrap()
});

/// Lower-cased words, keeping the characters that appear inside the table keywords.
fn words(lower: &str) -> HashSet<&str> {
    lower
        .split(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '+' | '#' | '\'')))
        .filter(|w| !w.is_empty())
        .collect()
}

fn lookup(lower: &str, words: &HashSet<&str>, table: Table) -> Option<&'static str> {
    table
        .iter()
        .find(|(keyword, _)| {
            if keyword.contains(' ') {
                lower.contains(keyword)
            } else {
                words.contains(keyword)
            }
        })
        .map(|(_, value)| *value)
}

/// Extract known attributes from one message.
///
/// ```
/// use diagnose::conversation::extract_context;
///
/// let ctx = extract_context("My Dell laptop on Windows 11 shows error 0x80070005");
/// assert_eq!(ctx.get("vendor").map(String::as_str), Some("dell"));
/// assert_eq!(ctx.get("os").map(String::as_str), Some("windows"));
/// assert_eq!(ctx.get("error_code").map(String::as_str), Some("0x80070005"));
/// ```
pub fn extract_context(text: &str) -> ContextMap {
    let lower = text.to_lowercase();
    let words = words(&lower);
    let mut context = ContextMap::new();

    for (key, table) in [
        (DEVICE_TYPE, DEVICE_TYPES),
        (VENDOR, VENDORS),
        (OS, OPERATING_SYSTEMS),
        (PROGRAMMING_LANGUAGE, PROGRAMMING_LANGUAGES),
        (CATEGORY, CATEGORIES),
    ] {
        if let Some(value) = lookup(&lower, &words, table) {
            context.insert(key.to_string(), value.to_string());
        }
    }

    if let Some(m) = ERROR_CODE_RE.find(text) {
        context.insert(ERROR_CODE.to_string(), m.as_str().to_string());
    }

    context
}
