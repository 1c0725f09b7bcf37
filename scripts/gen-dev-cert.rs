//! Local certificate generator for the arena tanks server
//!
//! Usage: `cargo run --manifest-path scripts/Cargo.toml -- [--force] [OUT_DIR]`
//!
//! Writes `cert.pem` and `key.pem` (default `../certs`, which is where the
//! server looks when `TLS_CERT_PATH`/`TLS_KEY_PATH` are unset) and prints the
//! base64 SHA-256 digest browsers need for `serverCertificateHashes`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const DEFAULT_OUT_DIR: &str = "../certs";

/// Browsers refuse hash-pinned certificates valid for longer than two weeks
const VALIDITY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

const SUBJECT_ALT_NAMES: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

struct Options {
    force: bool,
    out_dir: PathBuf,
}

fn parse_args() -> Options {
    let mut options = Options {
        force: false,
        out_dir: PathBuf::from(DEFAULT_OUT_DIR),
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--force" | "-f" => options.force = true,
            other => options.out_dir = PathBuf::from(other),
        }
    }
    options
}

fn main() -> Result<(), Box<dyn Error>> {
    let options = parse_args();
    let cert_path = options.out_dir.join("cert.pem");
    let key_path = options.out_dir.join("key.pem");

    if !options.force && cert_path.exists() && key_path.exists() {
        println!("Keeping existing certificate in {}", options.out_dir.display());
        println!("(pass --force to replace it)\n");
        return report(&cert_path);
    }

    fs::create_dir_all(&options.out_dir)?;
    let (cert_pem, key_pem) = generate()?;
    fs::write(&cert_path, cert_pem)?;
    fs::write(&key_path, key_pem)?;

    println!("Wrote {}", cert_path.display());
    println!("Wrote {}\n", key_path.display());
    report(&cert_path)
}

fn generate() -> Result<(String, String), Box<dyn Error>> {
    let names = SUBJECT_ALT_NAMES.iter().map(|s| s.to_string()).collect();
    let mut params = CertificateParams::new(names)?;

    let mut subject = DistinguishedName::new();
    subject.push(DnType::CommonName, "Arena Tanks Dev");
    subject.push(DnType::OrganizationName, "Arena Tanks");
    params.distinguished_name = subject;

    let now = SystemTime::now();
    params.not_before = now.into();
    params.not_after = (now + VALIDITY).into();

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;
    Ok((cert.pem(), key_pair.serialize_pem()))
}

fn report(cert_path: &Path) -> Result<(), Box<dyn Error>> {
    let parsed = pem::parse(fs::read_to_string(cert_path)?)?;
    let hash = STANDARD.encode(digest(&SHA256, parsed.contents()).as_ref());

    println!("Certificate SHA-256 (serverCertificateHashes):");
    println!("  {}\n", hash);
    println!("The server logs the same value at startup.");
    Ok(())
}
