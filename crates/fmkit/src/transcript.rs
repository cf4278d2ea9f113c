use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const PROMPT_SLUG_CHARS: usize = 30;

/// File-name fragment derived from the first characters of the prompt
pub fn prompt_slug(prompt: &str) -> String {
    prompt
        .chars()
        .take(PROMPT_SLUG_CHARS)
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

pub fn transcript_file_name(prompt: &str, timestamp: DateTime<Local>) -> String {
    format!(
        "response_{}_{}.txt",
        timestamp.format("%Y%m%d_%H%M%S"),
        prompt_slug(prompt)
    )
}

/// Write a prompt/response pair to `dir`, creating it when missing
pub fn save_response(
    dir: &Path,
    prompt: &str,
    response: &str,
    timestamp: DateTime<Local>,
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(transcript_file_name(prompt, timestamp));
    fs::write(&path, format!("Prompt: {}\n\nResponse:\n{}\n", prompt, response))?;
    Ok(path)
}
