use std::fs::File;
use std::path::PathBuf;

use chrono::DateTime;

use forge_formats::{bitlocker, luks, office, pdf, zip, FormatError};

/// Inspect a file or raw volume for encrypted containers and print a
/// deterministic one-line summary per finding.
fn main() {
    let mut args = std::env::args_os();
    let exe = args
        .next()
        .unwrap_or_else(|| std::ffi::OsString::from("forge-scan"));
    let usage = || {
        eprintln!("usage: {} [--volume] <path>", exe.to_string_lossy());
        std::process::exit(2);
    };

    let mut volume_mode = false;
    let mut path: Option<PathBuf> = None;
    for arg in args {
        if arg == "--volume" {
            volume_mode = true;
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else {
            usage();
        }
    }
    let Some(path) = path else {
        usage();
        unreachable!();
    };

    let result = if volume_mode {
        scan_volume(&path)
    } else {
        scan_file(&path)
    };
    match result {
        Ok(0) => {
            println!("no encrypted containers detected");
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn scan_file(path: &PathBuf) -> Result<usize, FormatError> {
    let bytes = std::fs::read(path).map_err(|source| FormatError::Io {
        context: "input file",
        source,
    })?;
    let mut findings = 0usize;

    if bytes.starts_with(b"PK") {
        match zip::parse_archive(&mut std::io::Cursor::new(&bytes)) {
            Ok(archive) => {
                for entry in archive.entries.iter().filter(|e| e.encrypted()) {
                    findings += 1;
                    println!(
                        "zip entry {} encryption={} compression={} offset={}",
                        entry.path,
                        entry.encryption.method_name(),
                        entry.compression_method_name(),
                        entry.local_header_offset,
                    );
                }
            }
            Err(err) => eprintln!("zip: {err}"),
        }
    }

    if bytes.starts_with(b"%PDF") {
        match pdf::parse_encryption(&bytes) {
            Ok(Some(enc)) => {
                findings += 1;
                println!(
                    "pdf encrypted filter={} V={} R={} length={} metadata_encrypted={}",
                    enc.filter, enc.version, enc.revision, enc.key_length_bits, enc.metadata_encrypted,
                );
            }
            Ok(None) => {}
            Err(err) => eprintln!("pdf: {err}"),
        }
    }

    match office::parse_office(&bytes) {
        Ok(Some(desc)) => {
            findings += 1;
            println!(
                "office encrypted mode={} cipher={} hash={}",
                desc.encryption_mode, desc.cipher_algorithm, desc.hash_algorithm,
            );
        }
        Ok(None) => {}
        Err(err) => eprintln!("office: {err}"),
    }

    Ok(findings)
}

fn scan_volume(path: &PathBuf) -> Result<usize, FormatError> {
    let mut file = File::open(path).map_err(|source| FormatError::Io {
        context: "input volume",
        source,
    })?;
    let mut findings = 0usize;

    if bitlocker::detect(&mut file)?.is_some() {
        let info = bitlocker::parse(&mut file)?;
        findings += 1;
        let created = DateTime::from_timestamp(info.creation_time_epoch, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| info.creation_time_epoch.to_string());
        println!(
            "bitlocker{} method={:?} created={} description={:?}",
            if info.to_go { " (to go)" } else { "" },
            info.encryption_method,
            created,
            info.description,
        );
        for protector in &info.key_protectors {
            println!("  key protector {} type={:?}", protector.guid, protector.protection_type);
        }
    }

    if luks::detect(&mut file)? {
        let info = luks::parse(&mut file)?;
        findings += 1;
        println!(
            "luks v{} cipher={} mode={} hash={} key_size={} active_slots={:?} uuid={}",
            info.version,
            info.cipher,
            info.mode,
            info.hash,
            info.key_size_bits,
            info.active_slots,
            info.guid,
        );
    }

    Ok(findings)
}
