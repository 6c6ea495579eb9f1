fn main() {
    // ploader provides its own `_start`. Link it static, non-PIE and without
    // the C start files so no C runtime or dynamic loader is mapped into it.
    // `mem*` come from compiler_builtins.
    for arg in ["-nostartfiles", "-static", "-no-pie"] {
        println!("cargo:rustc-link-arg-bin=ploader={}", arg);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
