use anyhow::bail;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::file_input_util;
use crate::file_output_util::Writer;
use crate::lib;

#[derive(Parser)]
pub struct AssemblerCli {
    input: PathBuf,
    #[clap(short, long, parse(from_os_str))]
    out: PathBuf,
}

pub fn assembler_main(cli: AssemblerCli) -> Result<()> {
    let mut writer = Writer::new(&cli.out)?;
    let mut error_count = 0;
    file_input_util::read_files(&cli.input, "j", |fname, data| {
        let source = match std::str::from_utf8(data) {
            Ok(source) => source,
            Err(err) => {
                log::error!("{} is not valid UTF-8: {}", fname, err);
                error_count += 1;
                return Ok(());
            }
        };

        let classes = match lib::parse(source) {
            Ok(classes) => classes,
            Err(err) => {
                log::error!("{}:{}", fname, err);
                error_count += 1;
                return Ok(());
            }
        };
        log::info!("parsed {} classes from {}", classes.len(), fname);

        for class in classes {
            let out = match lib::encode(&class) {
                Ok(out) => out,
                Err(err) => {
                    log::error!("{}: {}", fname, err);
                    error_count += 1;
                    continue;
                }
            };
            let name = format!("{}.class", class.name);
            writer.write(Some(&name), &out)?;
            log::info!("wrote {} bytes to {}", out.len(), name);
        }
        Ok(())
    })?;

    if error_count > 0 {
        bail!("Finished with {} errors", error_count);
    }
    Ok(())
}
