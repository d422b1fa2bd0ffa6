// driverprobe CLI: thin wrapper over the library's cli module.
// Usage: driverprobe run --compiler <PATH> <SCENARIO|DIR>...

fn main() {
    driverprobe::cli::run();
}
