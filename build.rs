fn main() {
    // The core library builds without Tauri; only the desktop shell needs the codegen.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
