use super::{json_pretty, make_toolchain, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use console::Style;
use ramfs_core::Assembler;
use ramfs_schema::AssemblyConfig;

pub fn run(config: AssemblyConfig, json: bool) -> Result<u8, String> {
    let toolchain = make_toolchain(&config)?;
    let assembler = Assembler::new(config, toolchain);

    let pb = if json {
        None
    } else {
        Some(spinner("assembling initramfs..."))
    };
    let report = match assembler.run() {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "initramfs assembled");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "assembly failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        println!("wrote {}", report.output.display());
        println!(
            "{} records, {} bytes ({} system files, {} user files, {} from seed archive)",
            report.records, report.bytes, report.system_files, report.user_files, report.ingested
        );
        println!("blake3: {}", report.digest);
        if !report.skipped_seeds.is_empty() {
            let warn = Style::new().yellow();
            for seed in &report.skipped_seeds {
                println!("{} {seed}", warn.apply_to("skipped:"));
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
