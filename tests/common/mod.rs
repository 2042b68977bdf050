use assert_cmd::Command;

pub fn boardpulse_bin() -> Command {
    #[allow(deprecated)]
    {
        Command::cargo_bin("boardpulse").expect("boardpulse test binary should build")
    }
}
