fn main() {
    // Rebuild when the expression grammar changes; pest_derive reads it at compile time
    println!("cargo:rerun-if-changed=src/grammar.pest");
}
