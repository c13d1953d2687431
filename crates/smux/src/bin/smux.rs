fn main() -> anyhow::Result<()> {
    let result = smux::app::run();

    // Ensure any error text lands on a sane terminal before exiting
    use std::io::{self, Write};
    let _ = io::stderr().flush();
    let _ = io::stdout().flush();

    result
}
