use std::env::var;
use std::fs::{read_dir, DirEntry, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn main() -> io::Result<()> {
  let out_dir = var("OUT_DIR").expect("OUT_DIR");
  let manifest_dir = var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR");
  let root = Path::new(&manifest_dir).join("shaderlib");
  let path = Path::new(&out_dir).join("shaderlib.rs");

  println!("cargo:rerun-if-changed=shaderlib");

  let mut manifest = File::create(path)?;
  let mut fragments: Vec<PathBuf> = Vec::new();

  visit_dirs(&root, &mut |entry| {
    fragments.push(entry.path());
  })?;

  // deterministic order, whatever the file system says
  fragments.sort();

  writeln!(&mut manifest, "pub fn shaderlib() -> &'static [(&'static str, &'static str)] {{")?;
  writeln!(&mut manifest, "  &[")?;

  for fragment in &fragments {
    let name = fragment.strip_prefix(&root).unwrap_or(fragment).to_string_lossy().replace('\\', "/");
    println!("cargo:rerun-if-changed={}", fragment.display());
    writeln!(&mut manifest, "    ({:?}, include_str!({:?})),", name, fragment)?;
  }

  writeln!(&mut manifest, "  ]")?;
  writeln!(&mut manifest, "}}") // shaderlib
}

fn visit_dirs<P, F>(dir: P, visitor: &mut F) -> io::Result<()> where P: AsRef<Path>, F: FnMut(&DirEntry) {
  let dir = dir.as_ref();

  if dir.is_dir() {
    for entry in read_dir(dir)? {
      let entry = entry?;
      let path = entry.path();

      if path.is_dir() {
        visit_dirs(path, visitor)?;
      } else {
        visitor(&entry);
      }
    }
  }

  Ok(())
}
