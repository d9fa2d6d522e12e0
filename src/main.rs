//! `head-amp-decode` command-line entry point

fn main() -> anyhow::Result<()> {
    head_amp_lib::run()
}
