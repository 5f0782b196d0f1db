//! Command helper methods for Test.

use std::process::Output;

use assert_cmd::Command;

use super::sun::TOKEN;
use super::Test;

impl Test {
    /// An `si` command wired to this test's HOME, working directory and
    /// fake Sun.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("si").expect("failed to find si binary");
        cmd.env("HOME", self.home.path());
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("SI_SUN_BASE_URL", self.sun.url());
        cmd.env("SI_SUN_TOKEN", TOKEN);
        cmd.env("NO_COLOR", "1");
        cmd.env("NO_PROXY", "127.0.0.1,localhost");
        cmd.env("no_proxy", "127.0.0.1,localhost");
        for var in [
            "SI_LOG",
            "SI_SUN_ACCOUNT",
            "SI_VAULT_SCOPE_DEFAULT",
            "SI_VAULT_AUDIT_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// `si vault <args>`.
    pub fn vault(&self, args: &[&str]) -> Output {
        self.cmd()
            .arg("vault")
            .args(args)
            .output()
            .expect("failed to run si vault")
    }

    pub fn init_cmd(&self, scope: &str) -> Output {
        self.vault(&["init", "--scope", scope])
    }

    pub fn set(&self, scope: &str, key: &str, value: &str) -> Output {
        self.vault(&["set", key, value, "--scope", scope])
    }

    pub fn get(&self, scope: &str, key: &str) -> Output {
        self.vault(&["get", key, "--scope", scope])
    }

    pub fn reveal(&self, scope: &str, key: &str) -> Output {
        self.vault(&["get", key, "--scope", scope, "--reveal"])
    }

    pub fn unset(&self, scope: &str, key: &str) -> Output {
        self.vault(&["unset", key, "--scope", scope])
    }

    pub fn list(&self, scope: &str) -> Output {
        self.vault(&["list", "--scope", scope])
    }
}
