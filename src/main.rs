fn main() {
    std::process::exit(uplink::run());
}
