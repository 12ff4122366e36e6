// Capability registry test modules
#[cfg(test)]
mod filter_tests;
