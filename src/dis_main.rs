use anyhow::bail;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::file_input_util;
use crate::file_output_util::Writer;
use crate::lib;
use crate::lib::ast;

#[derive(Parser)]
pub struct DisassemblerCli {
    input: PathBuf,
    #[clap(short, long, parse(from_os_str))]
    out: PathBuf,

    /// Encode every decoded class again and check that it decodes to the same AST
    #[clap(short, long)]
    roundtrip: bool,
}

fn check_roundtrip(class: &ast::Class) -> Result<()> {
    let data = lib::encode(class)?;
    let again = lib::decode_class(&data)?;
    if again.class != *class {
        bail!("class {} changed after encoding and decoding again", class.name);
    }

    let text = lib::disassemble(class);
    let parsed = lib::parse(&text)?;
    if parsed.len() != 1 || lib::disassemble(&parsed[0]) != text {
        bail!("class {} printed differently after parsing its own output", class.name);
    }
    Ok(())
}

pub fn disassembler_main(cli: DisassemblerCli) -> Result<()> {
    let mut writer = Writer::new(&cli.out)?;
    let mut error_count = 0;
    file_input_util::read_files(&cli.input, "class", |fname, data| {
        log::info!("disassemble {}", fname);
        let decoded = match lib::decode_class(data) {
            Ok(v) => v,
            Err(err) => {
                log::error!("Parse error in {}: {}", fname, err);
                error_count += 1;
                return Ok(());
            }
        };

        if cli.roundtrip {
            if let Err(err) = check_roundtrip(&decoded.class) {
                log::error!("Roundtrip failed for {}: {:#}", fname, err);
                error_count += 1;
            }
        }

        let out = lib::disassemble(&decoded.class);
        let name = format!("{}.j", decoded.class.name);
        writer.write(Some(&name), out.as_bytes())?;
        Ok(())
    })?;

    if error_count > 0 {
        bail!("Finished with {} errors", error_count);
    }
    Ok(())
}
