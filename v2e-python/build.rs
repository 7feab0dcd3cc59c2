fn main() {
    #[cfg(target_os = "macos")]
    {
        // libpython symbols come from the interpreter that imports the extension.
        println!("cargo:rustc-cdylib-link-arg=-undefined");
        println!("cargo:rustc-cdylib-link-arg=dynamic_lookup");
    }
}
