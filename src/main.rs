// Exclude entire file from coverage - binary entry point cannot be unit tested
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

fn main() -> std::process::ExitCode {
    chimewatch_lib::run()
}
