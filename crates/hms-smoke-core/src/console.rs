//! Verdict lines printed on stdout.
//!
//! Test drivers grep for these prefixes, so their spelling is fixed.

pub fn info(message: impl AsRef<str>) {
    println!("[INFO] {}", message.as_ref());
}

pub fn success(message: impl AsRef<str>) {
    println!("[SUCCESS] {}", message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    println!("[ERROR] {}", message.as_ref());
}

pub fn denied(message: impl AsRef<str>) {
    println!("[DENIED] {}", message.as_ref());
}
