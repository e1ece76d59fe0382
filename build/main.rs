use std::io::Result;

fn main() -> Result<()> {
    tonic_build::configure().compile_protos(&["proto/mmaster.proto"], &["proto/"])?;

    println!("cargo:rerun-if-changed=proto/mmaster.proto");

    Ok(())
}
