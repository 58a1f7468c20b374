//! Print what a datatype container holds
//!
//! Usage: `h5_inspect <file>...` or `h5_inspect --formats`

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use datatype_h5::h5::{registered_formats, Accessor, DataSetMetaData};
use datatype_h5::storage::MetaValue;

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        anyhow::bail!("usage: h5_inspect <file>... | --formats");
    }

    if args.iter().any(|a| a == "--formats") {
        for tag in registered_formats() {
            println!("{}", tag);
        }
        return Ok(());
    }

    for path in &args {
        inspect(Path::new(path)).with_context(|| format!("Failed to inspect {}", path))?;
    }
    Ok(())
}

fn show(value: &MetaValue) -> String {
    match value {
        MetaValue::Bool(b) => b.to_string(),
        MetaValue::Int(i) => i.to_string(),
        MetaValue::Float(f) => f.to_string(),
        MetaValue::Str(s) => format!("{:?}", s),
    }
}

fn bound(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn inspect(path: &Path) -> Result<()> {
    let mut descriptor = datatype_h5::from_file(path)?;
    info!("Inspecting {:?}", path);

    println!("{}", path.display());
    println!("  written_by: {}", descriptor.written_by());

    let file = descriptor.file_mut();
    println!("  metadata:");
    for (key, value) in file.get_metadata()? {
        println!("    {} = {}", key, show(&value));
    }

    let accessors: Vec<Accessor> = file.iter_accessors().cloned().collect();
    println!("  datasets:");
    for accessor in &accessors {
        let storage = file.storage_mut();
        let stored = match accessor {
            Accessor::DataSet(d) => d.field_name().to_string(),
            Accessor::SparseMatrix(s) => s.data_name(),
            _ => continue,
        };
        if !storage.has_dataset(&stored)? {
            println!("    {} (absent)", accessor.field_name());
            continue;
        }
        // sparse bounds live on the `_data` dataset
        let meta = DataSetMetaData::from_dict(&storage.get_metadata(Some(&stored))?);
        println!(
            "    {} {:?} min={} max={}",
            accessor.field_name(),
            storage.get_data_shape(&stored)?,
            bound(meta.min),
            bound(meta.max)
        );
    }

    let references = descriptor.gather_references()?;
    if !references.is_empty() {
        println!("  references:");
        for (field, gid) in references {
            match gid {
                Some(gid) => println!("    {} -> {}", field, gid),
                None => println!("    {} -> (none)", field),
            }
        }
    }

    descriptor.close_boxed()?;
    Ok(())
}
