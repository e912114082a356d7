use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

/// Output destination chosen from the extension of the `--out` path.
pub enum Writer {
    Dir(PathBuf),
    Jar(zip::ZipWriter<fs::File>),
    Merged(fs::File),
    Single(fs::File, bool),
}
impl Writer {
    pub fn new(p: &Path) -> Result<Self> {
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent)?;
        }
        let ext = match p.extension().and_then(|s| s.to_str()) {
            Some(ext) if !p.is_dir() => ext.to_ascii_lowercase(),
            // paths without an extension are output directories
            _ => {
                fs::create_dir_all(p)?;
                return Ok(Self::Dir(p.into()));
            }
        };
        let f = fs::File::create(p).with_context(|| format!("Unable to create {}", p.display()))?;
        Ok(match ext.as_str() {
            "jar" | "zip" => Self::Jar(zip::ZipWriter::new(f)),
            "j" => Self::Merged(f),
            "class" => Self::Single(f, false),
            _ => bail!("Unsupported output extension {}", ext),
        })
    }

    pub fn write(&mut self, name: Option<&str>, data: &[u8]) -> Result<()> {
        use Writer::*;
        match self {
            Dir(dir) => {
                let name = name.ok_or_else(|| {
                    anyhow!("Class has missing or invalid name. Try specifying a single file output name explicitly.")
                })?;
                if name.contains("..") {
                    bail!("Invalid path {}. Try outputting to a zip file instead.", name)
                }
                let p = dir.join(name);
                log::info!("Writing to {}", p.display());
                if let Some(parent) = p.parent() {
                    fs::create_dir_all(parent)
                        .context("Unable to create directory. Try outputting to a zip file instead")?;
                }
                let mut f =
                    fs::File::create(p).context("Unable to create file. Try outputting to a zip file instead")?;
                f.write_all(data)?;
            }
            Jar(zw) => {
                let name = name.ok_or_else(|| {
                    anyhow!("Class has missing or invalid name. Try specifying a single file output name explicitly.")
                })?;
                let options = zip::write::FileOptions::default()
                    .compression_method(zip::CompressionMethod::Stored)
                    .last_modified_time(zip::DateTime::default());

                zw.start_file(name, options)?;
                zw.write_all(data)?;
            }
            Merged(f) => {
                f.write_all(data)?;
            }
            Single(f, used) => {
                if *used {
                    bail!("Attempting to write multiple classes to single file. Try outputting to a zip file instead.")
                }
                f.write_all(data)?;
                *used = true;
            }
        }
        Ok(())
    }
}
