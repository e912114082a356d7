use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use std::fs;
use std::io::Read;
use std::path::Path;

fn has_ext(name: &str, ext: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, e)) => e.eq_ignore_ascii_case(ext),
        None => false,
    }
}

/// Calls `cb` with the name and contents of `p` itself, or of every entry
/// with extension `ext` if `p` is a jar or zip archive.
pub fn read_files(p: &Path, ext: &str, mut cb: impl FnMut(&str, &[u8]) -> Result<()>) -> Result<()> {
    let name = p.to_string_lossy();
    if p.extension().is_none() {
        bail!("Missing input file extension for '{}'", name);
    }

    if has_ext(&name, ext) {
        let data = fs::read(p).with_context(|| format!("Unable to read {}", name))?;
        return cb(&name, &data);
    }
    if !has_ext(&name, "jar") && !has_ext(&name, "zip") {
        return Err(anyhow!("Unsupported input extension for '{}'", name));
    }

    let file = fs::File::open(p).with_context(|| format!("Unable to open {}", name))?;
    let mut archive = zip::ZipArchive::new(file).with_context(|| format!("{} is not a valid archive", name))?;
    log::info!("{} has {} entries", name, archive.len());

    let mut buf = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let entry_name = entry.name().to_owned();
        if entry.is_dir() || !has_ext(&entry_name, ext) {
            log::trace!("skipping archive entry {}", entry_name);
            continue;
        }

        buf.clear();
        buf.reserve(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        cb(&entry_name, &buf)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_ext() {
        assert!(has_ext("a/B.class", "class"));
        assert!(has_ext("Foo.JAR", "jar"));
        assert!(!has_ext("Foo.classes", "class"));
        assert!(!has_ext("class", "class"));
    }
}
