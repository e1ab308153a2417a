//! X11 window enumeration
//!
//! Asks the window manager for its client list through `wmctrl -l`. Without
//! wmctrl (or outside an EWMH window manager) only the screen is offered.

use super::traits::CaptureSource;
use std::process::Command;

/// Managed top-level windows, skipping sticky ones such as panels and docks
pub fn list_windows() -> Vec<CaptureSource> {
    let output = match Command::new("wmctrl").arg("-l").output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::debug!("wmctrl exited with {}", output.status);
            return Vec::new();
        }
        Err(e) => {
            tracing::debug!("wmctrl unavailable, listing screens only: {}", e);
            return Vec::new();
        }
    };

    parse_client_list(&String::from_utf8_lossy(&output.stdout))
}

/// Parse `wmctrl -l` rows: `<hex id> <desktop> <host> <title...>`
pub fn parse_client_list(output: &str) -> Vec<CaptureSource> {
    output
        .lines()
        .filter_map(|line| {
            let (id, rest) = next_field(line)?;
            let (desktop, rest) = next_field(rest)?;
            let (_host, title) = next_field(rest)?;

            if desktop == "-1" || title.is_empty() {
                return None;
            }
            let handle = u64::from_str_radix(id.trim_start_matches("0x"), 16).ok()?;
            Some(CaptureSource::window(handle, title))
        })
        .collect()
}

fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], s[end..].trim())),
        None => Some((s, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_list() {
        let output = "0x01e00003 -1 laptop Top Panel
0x03a00003  0 laptop Terminal - vim main.rs
0x04000001  1 laptop   
garbage
";
        let windows = parse_client_list(output);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].id, "window:60817411");
        assert_eq!(windows[0].name, "Terminal - vim main.rs");
    }
}
