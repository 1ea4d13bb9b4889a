use std::{
    io::{ErrorKind, SeekFrom},
    path::Path,
};

use anyhow::Result;
use tokio::{
    fs::File,
    io::{self, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWriteExt},
};

/// Reads the last non-blank line of a file without reading the whole file. Trailing whitespace is
/// kept on the returned line, except for the line break.
pub async fn read_last_line(
    file: &mut (impl AsyncSeek + AsyncRead + Unpin),
    buffer: &mut [u8],
) -> Result<Option<String>, io::Error> {
    let mut end = file.seek(SeekFrom::End(0)).await?;
    let mut tail = Vec::<u8>::new();

    // Walk backwards chunk by chunk, collecting bytes until a line break precedes some content.
    while end > 0 {
        let chunk = u64::min(end, buffer.len() as u64) as usize;
        end -= chunk as u64;
        file.seek(SeekFrom::Start(end)).await?;
        file.read_exact(&mut buffer[..chunk]).await?;

        let mut joined = buffer[..chunk].to_vec();
        joined.extend_from_slice(&tail);
        tail = joined;

        let content_end = tail
            .iter()
            .rposition(|v| !v.is_ascii_whitespace())
            .map(|v| v + 1);
        if let Some(content_end) = content_end {
            if let Some(line_start) = tail[..content_end].iter().rposition(|v| *v == b'\n') {
                tail.drain(..=line_start);
                break;
            }
        }
    }

    let line = String::from_utf8_lossy(&tail);
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(line.to_string()))
    }
}

/// Reads a whole text file. A missing file is returned as [None].
pub async fn read_optional(path: &Path) -> Result<Option<String>, io::Error> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces the contents of a file. Data goes into a sibling temporary file first, which is then
/// renamed over the target, so readers never observe a half written file.
pub async fn overwrite(path: &Path, data: &str) -> Result<()> {
    let mut temporary = path.as_os_str().to_owned();
    temporary.push(".tmp");
    let temporary = Path::new(&temporary);

    let mut file = File::create(temporary).await?;
    file.write_all(data.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(temporary, path).await?;
    Ok(())
}
