use anyhow::{Result, anyhow};

#[cfg(not(target_os = "linux"))]
use copypasta::{ClipboardContext, ClipboardProvider};

#[cfg(target_os = "linux")]
use std::process::{Command, Stdio};

const PIPE_HINT: &str = "passbook show <sel> --password-only | xclip -selection clipboard";

/// Утилита буфера обмена и переменная окружения, при которой её пробуем.
#[cfg(target_os = "linux")]
const TOOLS: &[(&str, &str, &[&str])] = &[
    ("WAYLAND_DISPLAY", "wl-copy", &[]),
    ("DISPLAY", "xclip", &["-selection", "clipboard"]),
    ("DISPLAY", "xsel", &["--clipboard", "--input"]),
];

/// Linux: wl-copy под Wayland, xclip/xsel под X11.
#[cfg(target_os = "linux")]
pub fn copy_to_clipboard(value: &str) -> Result<()> {
    let candidates: Vec<_> = TOOLS
        .iter()
        .filter(|(env, _, _)| std::env::var_os(env).is_some())
        .collect();

    // ни X11, ни Wayland — скорее всего чистый tty
    if candidates.is_empty() {
        return Err(anyhow!(
            "No graphical clipboard found (DISPLAY and WAYLAND_DISPLAY are unset).\n\
             Pipe the password instead:\n  {PIPE_HINT}"
        ));
    }

    for (_, cmd, args) in candidates {
        match pipe_to(cmd, args, value) {
            Ok(()) => {
                tracing::debug!(tool = *cmd, "copied to clipboard");
                return Ok(());
            }
            Err(e) => tracing::debug!(tool = *cmd, error = %e, "clipboard tool failed"),
        }
    }

    Err(anyhow!(
        "Could not copy: none of wl-copy, xclip, xsel worked.\n\
         Install `wl-clipboard` or `xclip`, or pipe the password:\n  {PIPE_HINT}"
    ))
}

#[cfg(target_os = "linux")]
fn pipe_to(cmd: &str, args: &[&str], value: &str) -> Result<()> {
    use std::io::Write;

    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to start {cmd}: {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(value.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(anyhow!("{cmd} exited with {status}"));
    }
    Ok(())
}

/// Windows/macOS: через copypasta.
#[cfg(not(target_os = "linux"))]
pub fn copy_to_clipboard(value: &str) -> Result<()> {
    let mut ctx = ClipboardContext::new()
        .map_err(|e| anyhow!("Clipboard is unavailable: {e}\nPipe the password instead:\n  {PIPE_HINT}"))?;
    ctx.set_contents(value.to_string())
        .map_err(|e| anyhow!("Could not copy: {e}"))?;
    Ok(())
}
