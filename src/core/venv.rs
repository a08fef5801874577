//! The venv entrypoint: a POSIX `sh` script run as root inside the
//! container that recreates the host user and then drops to it.

use crate::domain::model::UserIdentity;
use crate::utils::error::Result;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const VENV_PATH: &str = "/.dockerw";
pub const VENV_COPY_PATH: &str = "/.dockerw/copy";
pub const VENV_RC_PATH: &str = "/.dockerw/rc.sh";
/// Host directory holding entrypoint scripts, bind mounted at the same path.
pub const SCRIPT_DIR: &str = "/tmp/dockerw";
/// Width of the middle column of the login summary table.
const SUMMARY_WIDTH: usize = 52;

pub fn venv_home_path(identity: &UserIdentity) -> String {
    format!("{}/home/{}", VENV_PATH, identity.name)
}

const LOGIN_BANNER: &str = r#"                 ,,))))))));,
              __)))))))))))))),
   \|/       -\(((((''''((((((((.     .----------------------------.
   -*-==//////((''  .     `)))))),   /  DOCKERW VENV _____________)
   /|\      ))| o    ;-.    '(((((  /            _______________)   ,(,
            ( `|    /  )    ;))))' /         _______________)    ,_))^;(~
               |   |   |   ,))((((_/      ________) __          %,;(;(>';'~
               o_);   ;    )))(((`    \ \   ~---~  `:: \       %%~~)(v;(`('~
                     ;    ''''````         `:       `:: |\,__,%%    );`'; ~ %
                    |   _                )     /      `:|`----'     `-'
              ______/\/~    |                 /        /
            /~;;.____/;;'  /          ___--,-(   `;;;/
           / //  _;______;'------~~~~~    /;;/\    /
          //  | |                        / ;   \;;,\
         (<_  | ;                      /',/-----'  _>
          \_| ||_                     //~;~~~~~~~~~"#;

/// Quotes `word` for a POSIX shell unless it only has safe characters.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

fn escape_double_quoted(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Command run as the user: the image command without the image, with a
/// leading `--` dropped, or the user's shell when empty.
pub fn user_command(image_args: &[String]) -> String {
    let args = match image_args.first() {
        Some(first) if first == "--" => &image_args[1..],
        _ => image_args,
    };
    if args.is_empty() {
        "\"$SHELL\"".to_string()
    } else {
        args.iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct VenvScript<'a> {
    pub identity: &'a UserIdentity,
    pub hostname: String,
    pub cpu: String,
    pub prompt_banner: String,
    /// Docker socket group, set when Docker-outside-of-Docker is enabled.
    pub dood_gid: Option<u32>,
    /// Staged copy destinations, each under `VENV_COPY_PATH`.
    pub copy_destinations: Vec<String>,
    pub command: String,
}

impl VenvScript<'_> {
    pub fn render(&self, script_path: &Path) -> String {
        let uid = self.identity.uid;
        let gid = self.identity.gid;
        let user = &self.identity.name;
        let venv_home = venv_home_path(self.identity);
        let mut s = String::new();

        s.push_str("# shellcheck disable=SC2148,SC2016\n");
        s.push_str("if [ -z \"$SHELL\" ]; then SHELL=\"$(command -v sh)\"; export SHELL; fi\n");
        s.push_str("if [ \"$(basename \"$SHELL\")\" = \"sh\" ]; then\n");
        s.push_str("  if bash --help > /dev/null 2>&1; then SHELL=\"$(command -v bash)\"; export SHELL; fi\n");
        s.push_str("fi\n");
        s.push_str(&format!("mkdir -p {}\n", venv_home));
        s.push_str(&format!(
            "mv {} {}/.dockerw_entrypoint.sh\n",
            script_path.display(),
            venv_home
        ));

        // an image user holding our uid would shadow the host user
        s.push_str(&format!(
            "_existing_user=$(awk -v uid={} -F\":\" '{{ if($3==uid){{print $1}} }}' /etc/passwd 2>/dev/null)\n",
            uid
        ));
        s.push_str("if [ -n \"$_existing_user\" ]; then\n");
        s.push_str("  if userdel --help > /dev/null 2>&1; then\n");
        s.push_str("    userdel \"$_existing_user\" > /dev/null 2>&1\n");
        s.push_str("  else\n");
        s.push_str("    deluser \"$_existing_user\" > /dev/null 2>&1\n");
        s.push_str("  fi\n");
        s.push_str("  mv /home/\"$_existing_user\" /home/_venv_orig_user_\"$_existing_user\"\n");
        s.push_str("fi\n");

        s.push_str("if groupadd --help > /dev/null 2>&1; then\n");
        s.push_str(&format!("  groupadd -g {} {} > /dev/null 2>&1\n", gid, user));
        s.push_str(&format!(
            "  useradd -s \"$SHELL\" -u {} -m {} -g {} > /dev/null 2>&1\n",
            uid, user, gid
        ));
        if let Some(dood_gid) = self.dood_gid {
            s.push_str(&format!("  groupadd -g {} dood > /dev/null 2>&1\n", dood_gid));
            s.push_str(&format!("  usermod -aG dood {} > /dev/null 2>&1\n", user));
        }
        s.push_str(&format!("  usermod -aG wheel {} > /dev/null 2>&1\n", user));
        s.push_str("else\n");
        s.push_str(&format!("  addgroup -g {} {} > /dev/null 2>&1\n", gid, user));
        s.push_str(&format!(
            "  adduser -s \"$SHELL\" -u {} -D {} -G {} > /dev/null 2>&1\n",
            uid, user, user
        ));
        if let Some(dood_gid) = self.dood_gid {
            s.push_str(&format!("  addgroup -g {} dood > /dev/null 2>&1\n", dood_gid));
            s.push_str(&format!("  addgroup {} dood > /dev/null 2>&1\n", user));
        }
        s.push_str(&format!("  addgroup {} wheel > /dev/null 2>&1\n", user));
        s.push_str("fi\n");

        s.push_str(&format!("mkdir -p /home/{}\n", user));
        s.push_str(&format!("cp -a /home/{} {}/home\n", user, VENV_PATH));
        s.push_str(&format!("rm -rf /home/{}\n", user));
        s.push_str(&format!("mv {} /home\n", venv_home));
        s.push_str(&format!("rmdir {}/home > /dev/null 2>&1\n", VENV_PATH));
        s.push_str(&format!("rmdir {} > /dev/null 2>&1\n", VENV_PATH));
        s.push_str(&format!("passwd -d {} > /dev/null 2>&1\n", user));
        s.push_str(&format!("echo \"{} ALL=(ALL) NOPASSWD:ALL\" >> /etc/sudoers\n", user));
        s.push_str(&format!("ln -s \"$PWD\" /home/{}/workdir > /dev/null 2>&1\n", user));
        s.push_str(&format!(
            "chown -h {}:{} /home/{}/workdir > /dev/null 2>&1\n",
            uid, gid, user
        ));

        s.push_str(&format!("mkdir -p {}\n", VENV_PATH));
        s.push_str(&format!(
            "echo \"_dockerw_workdir=\\\"$PWD\\\"\" > {}\n",
            VENV_RC_PATH
        ));
        s.push_str(&format!("cat >> {} << 'DOCKERW_RC'\n", VENV_RC_PATH));
        s.push_str(&self.render_rc());
        s.push_str("DOCKERW_RC\n");
        s.push_str(&format!("echo . {} >> /home/{}/.bashrc\n", VENV_RC_PATH, user));
        s.push_str(&format!("echo . {} >> /root/.bashrc\n", VENV_RC_PATH));
        s.push_str(&format!("HOME=/home/{}\n", user));
        s.push_str("export HOME\n");
        s.push_str(&format!("ENV={}\n", VENV_RC_PATH));
        s.push_str("export ENV\n");

        s.push_str("run_user_cmd() {\n");
        s.push_str("  _is_exec=$1; shift\n");
        s.push_str("  _userspec=$1; shift\n");
        s.push_str("  _username=$1; shift\n");
        s.push_str("  if $_is_exec; then _exec=\"exec\"; fi\n");
        s.push_str("  if chroot --userspec=\"$_userspec\" --skip-chdir / id > /dev/null 2>&1; then\n");
        s.push_str("    $_exec chroot --userspec=\"$_userspec\" --skip-chdir / \"$@\"\n");
        s.push_str("  elif su -p \"$_username\" --session-command \"id\" > /dev/null 2>&1; then\n");
        s.push_str("    $_exec su -p \"$_username\" --session-command \"$*\"\n");
        s.push_str("  else\n");
        s.push_str("    $_exec su -p \"$_username\" -c \"$*\"\n");
        s.push_str("  fi\n");
        s.push_str("}\n");

        for dest in &self.copy_destinations {
            let Some(target) = dest.strip_prefix(VENV_COPY_PATH) else {
                continue;
            };
            let target_parent = Path::new(target)
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "/".to_string());
            s.push_str(&format!("mkdir -p {}\n", target_parent));
            s.push_str(&format!("if [ -d \"{}\" ]; then\n", dest));
            s.push_str(&format!("  mkdir -p {}\n", target));
            s.push_str("  # shellcheck disable=SC2046\n");
            s.push_str(&format!("  chown $(stat -c \"%u:%g\" {}) {}\n", dest, target));
            s.push_str("fi\n");
            s.push_str(&format!(
                "run_user_cmd false {}:{} {} cp -afT {} {}\n",
                uid, gid, user, dest, target
            ));
        }

        s.push_str(&format!(
            "run_user_cmd true {}:{} {} {}\n",
            uid, gid, user, self.command
        ));
        s
    }

    /// Contents of `/.dockerw/rc.sh`, written literally through a quoted
    /// heredoc so nothing here is expanded by the entrypoint.
    fn render_rc(&self) -> String {
        let uid = self.identity.uid;
        let gid = self.identity.gid;
        let user = &self.identity.name;
        let banner = escape_double_quoted(&self.prompt_banner);
        let cpu = escape_double_quoted(&self.cpu);
        // printf pads by bytes, so widen the column by the multi-byte excess
        let cpu_width = SUMMARY_WIDTH + self.cpu.len() - self.cpu.chars().count();
        let width = SUMMARY_WIDTH;
        let mut s = String::new();

        s.push_str("# shellcheck disable=SC2148\n");
        s.push_str("unset PROMPT_COMMAND\n");
        s.push_str(&format!("HOSTNAME=\"${{HOSTNAME:-{}}}\"\n", self.hostname));
        s.push_str("export HOSTNAME\n");
        s.push_str("_g=\"$(printf '\\033[32m')\"\n");
        s.push_str("_b=\"$(printf '\\033[34m')\"\n");
        s.push_str("_i=\"$(printf '\\033[7m')\"\n");
        s.push_str("_n=\"$(printf '\\033[0m')\"\n");
        s.push_str("_curr_shell=\"$(command -v \"$0\")\"\n");
        s.push_str("if readlink -f \"$_curr_shell\" > /dev/null 2>&1; then _curr_shell=\"$(readlink -f \"$_curr_shell\")\"; fi\n");
        s.push_str("case \"$(basename \"$_curr_shell\")\" in\n");
        s.push_str("  dash|ksh)\n");
        // no prompt escapes in these shells, so the newlines are literal
        s.push_str("    _ps1_user=\"$(whoami)\"\n");
        s.push_str(&format!(
            "    PS1=\"$_i📦{}$_n\n$_g$_ps1_user@$HOSTNAME$_n $_b\\$PWD$_n\n\\$ \" ;;\n",
            banner
        ));
        s.push_str("  *)\n");
        s.push_str(&format!(
            "    PS1=\"$_i📦{}$_n\\n$_g\\u@\\h$_n $_b\\w$_n\\n\\\\\\$ \" ;;\n",
            banner
        ));
        s.push_str("esac\n");

        s.push_str(&format!(
            "if [ \"$(id -u)\" != \"{}\" ] && [ \"$SUDO_UID\" != \"{}\" ]; then\n",
            uid, uid
        ));
        s.push_str("  cd \"$_dockerw_workdir\" || exit\n");
        s.push_str(&format!("  HOME=/home/{}\n", user));
        s.push_str("  export HOME\n");
        s.push_str(&format!(
            "  if chroot --userspec={}:{} --skip-chdir / id > /dev/null 2>&1; then\n",
            uid, gid
        ));
        s.push_str(&format!(
            "    exec chroot --userspec={}:{} --skip-chdir / \"$0\"\n",
            uid, gid
        ));
        s.push_str(&format!(
            "  elif su -p {} --session-command \"id\" > /dev/null 2>&1; then\n",
            user
        ));
        s.push_str(&format!("    exec su -p {} --session-command \"$0\"\n", user));
        s.push_str("  else\n");
        s.push_str(&format!("    exec su -p {} \"$0\"\n", user));
        s.push_str("  fi\n");
        s.push_str("fi\n");

        s.push_str("_uptime=\"$(awk '{ printf \"%d\", $1 }' /proc/uptime)\"\n");
        s.push_str("_minutes=$((_uptime / 60))\n");
        s.push_str("_hours=$((_minutes / 60))\n");
        s.push_str("_minutes=$((_minutes % 60))\n");
        s.push_str("_days=$((_hours / 24))\n");
        s.push_str("_hours=$((_hours % 24))\n");
        s.push_str("_weeks=$((_days / 7))\n");
        s.push_str("_days=$((_days % 7))\n");
        s.push_str("_uptime=\"up $_weeks weeks, $_days days, $_hours hours, $_minutes minutes\"\n");
        s.push_str("_mem_total=$(grep 'MemTotal:' /proc/meminfo | awk '{ print $2 }')\n");
        s.push_str("_mem_avail=$(grep 'MemAvailable:' /proc/meminfo | awk '{ print $2 }')\n");
        s.push_str("_mem_used=$((_mem_total - _mem_avail))\n");
        for var in ["_mem_used", "_mem_total", "_mem_avail"] {
            s.push_str(&format!(
                "{var}=$(awk -v mem_kb=\"${var}\" 'BEGIN{{ printf \"%.1fG\", mem_kb / 1000000}}')\n"
            ));
        }
        s.push_str("_mem=\"$_mem_used used, $_mem_total total ($_mem_avail avail)\"\n");
        s.push_str("_disk_free=$(df -h / | awk 'FNR == 2 { print $4 }')\n");
        s.push_str("_disk_used=$(df -h / | awk 'FNR == 2 { print $3 }')\n");

        s.push_str("cat << \"EOF\"\n");
        s.push_str(LOGIN_BANNER);
        s.push_str("\nEOF\n");
        s.push_str(&format!(
            "printf '%s%s%s %s %s%s%s %s %s%s\\n' \"$_g\" \"{}╴\" \"$_n\" '`\\-|' \"$_g\" \"{}\" \"$_n\" '\\(,~~' \"$_g\" \"{}\"\n",
            "─".repeat(13),
            "─".repeat(17),
            "─".repeat(37)
        ));
        s.push_str(&format!(
            "printf '%s%s %s %s%s\\n' \"{}\" \"$_n\" '\\~|' \"$_g\" \"{}\"\n",
            "━".repeat(37),
            "━".repeat(38)
        ));
        s.push_str(&format!(
            "printf \"┃$_n    CPU $_g┃$_n %-{w}.{w}s $_g┃$_n  DISK SPACE  $_g┃\\n\" \"{cpu}\"\n",
            w = cpu_width,
            cpu = cpu
        ));
        s.push_str(&format!(
            "printf \"┃$_n    RAM $_g┃$_n %-{w}.{w}s $_g┃$_n free  %6s $_g┃\\n\" \"$_mem\" \"$_disk_free\"\n",
            w = width
        ));
        s.push_str(&format!(
            "printf \"┃$_n UPTIME $_g┃$_n %-{w}.{w}s $_g┃$_n used  %6s $_g┃$_n\\n\" \"$_uptime\" \"$_disk_used\"\n",
            w = width
        ));
        s
    }
}

/// Creates the shared script directory, world-writable so every host user
/// can drop scripts in it.
pub fn prepare_script_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o777))?;
    }
    Ok(())
}

/// Writes a new uniquely named script into `dir`. `render` receives the
/// final path since the script refers to itself.
pub fn persist_script<F>(dir: &Path, render: F) -> Result<PathBuf>
where
    F: FnOnce(&Path) -> String,
{
    prepare_script_dir(dir)?;
    let mut file = tempfile::Builder::new().prefix("tmp").tempfile_in(dir)?;
    let contents = render(file.path());
    file.write_all(contents.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    tracing::debug!("Wrote venv entrypoint {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity() -> UserIdentity {
        UserIdentity {
            uid: 1234,
            gid: 5678,
            name: "kyle".to_string(),
            home: PathBuf::from("/home/kyle"),
        }
    }

    fn script(identity: &UserIdentity) -> VenvScript<'_> {
        VenvScript {
            identity,
            hostname: "devbox".to_string(),
            cpu: "Intel® Xeon® (8 vCPU)".to_string(),
            prompt_banner: "docker.io/ubuntu:latest".to_string(),
            dood_gid: None,
            copy_destinations: vec![],
            command: "\"$SHELL\"".to_string(),
        }
    }

    #[test]
    fn test_user_command() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(user_command(&[]), "\"$SHELL\"");
        assert_eq!(user_command(&args(&["--"])), "\"$SHELL\"");
        assert_eq!(user_command(&args(&["--", "make", "-j8"])), "make -j8");
        assert_eq!(user_command(&args(&["echo", "a b"])), "echo 'a b'");
    }

    #[test]
    fn test_render_contains_identity_and_command() {
        let id = identity();
        let mut venv = script(&id);
        venv.command = "make test".to_string();
        let rendered = venv.render(Path::new("/tmp/dockerw/tmpabc"));

        assert!(rendered.contains("mv /tmp/dockerw/tmpabc /.dockerw/home/kyle/.dockerw_entrypoint.sh"));
        assert!(rendered.contains("groupadd -g 5678 kyle"));
        assert!(rendered.contains("useradd -s \"$SHELL\" -u 1234 -m kyle -g 5678"));
        assert!(rendered.contains("HOSTNAME=\"${HOSTNAME:-devbox}\""));
        assert!(rendered.trim_end().ends_with("run_user_cmd true 1234:5678 kyle make test"));
        assert!(!rendered.contains("dood"));
    }

    #[test]
    fn test_render_dood_and_copies() {
        let id = identity();
        let mut venv = script(&id);
        venv.dood_gid = Some(998);
        venv.copy_destinations = vec!["/.dockerw/copy/home/kyle/.ssh".to_string()];
        let rendered = venv.render(Path::new("/tmp/dockerw/tmpabc"));

        assert!(rendered.contains("groupadd -g 998 dood"));
        assert!(rendered.contains("addgroup kyle dood"));
        assert!(rendered.contains("mkdir -p /home/kyle\n"));
        assert!(rendered.contains(
            "run_user_cmd false 1234:5678 kyle cp -afT /.dockerw/copy/home/kyle/.ssh /home/kyle/.ssh"
        ));
    }

    #[test]
    fn test_rc_pads_multibyte_cpu_name() {
        let id = identity();
        let rendered = script(&id).render(Path::new("/tmp/x"));
        // two '®' are two bytes each
        assert!(rendered.contains("%-54.54s"));
        assert!(rendered.contains("%-52.52s"));
    }

    #[test]
    fn test_persist_script() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("dockerw");
        let path = persist_script(&scripts, |p| format!("echo {}\n", p.display())).unwrap();

        assert!(path.starts_with(&scripts));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            format!("echo {}\n", path.display())
        );
        let mode = std::fs::metadata(&scripts).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("ls"), "ls");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
