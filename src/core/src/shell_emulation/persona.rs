//! Fake OS identities presented to the peer.
//!
//! A persona is static data: banner, prompts and a small table of canned
//! command outputs. One is drawn per session and never changes afterwards.

use log::debug;
use rand::seq::SliceRandom;
use rand::RngCore;

use crate::error_handling::types::ConfigError;

/// Canned output for one exact argument vector.
#[derive(Debug, PartialEq, Eq)]
pub struct CannedCommand {
    pub argv: &'static [&'static str],
    pub output: &'static str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Persona {
    pub name: &'static str,
    pub hostname: &'static str,
    /// Line shown before the login prompt, when the transport shows one.
    pub issue: &'static str,
    /// Message of the day, shown when the shell starts.
    pub banner: &'static str,
    pub login_prompt: &'static str,
    pub password_prompt: &'static str,
    pub shell_prompt: &'static str,
    /// Answer to `uname -a`.
    pub identity: &'static str,
    pub commands: &'static [CannedCommand],
}

impl Persona {
    pub fn lookup(&self, argv: &[&str]) -> Option<&'static str> {
        self.commands
            .iter()
            .find(|c| c.argv == argv)
            .map(|c| c.output)
    }
}

pub static UBUNTU: Persona = Persona {
    name: "ubuntu-20.04",
    hostname: "web-prod-02",
    issue: "Ubuntu 20.04.6 LTS\n",
    banner: "Welcome to Ubuntu 20.04.6 LTS (GNU/Linux 5.4.0-169-generic x86_64)\n\n \
* Documentation:  https://help.ubuntu.com\n \
* Management:     https://landscape.canonical.com\n \
* Support:        https://ubuntu.com/advantage\n\n\
Last login: Mon Mar 11 09:12:44 2024 from 10.0.3.15\n",
    login_prompt: "web-prod-02 login: ",
    password_prompt: "Password: ",
    shell_prompt: "root@web-prod-02:~# ",
    identity: "Linux web-prod-02 5.4.0-169-generic #187-Ubuntu SMP Thu Nov 23 14:52:28 UTC 2023 x86_64 x86_64 x86_64 GNU/Linux\n",
    commands: &[
        CannedCommand {
            argv: &["id", "-a"],
            output: "uid=0(root) gid=0(root) groups=0(root)\n",
        },
        CannedCommand {
            argv: &["id"],
            output: "uid=0(root) gid=0(root) groups=0(root)\n",
        },
        CannedCommand {
            argv: &["whoami"],
            output: "root\n",
        },
        CannedCommand {
            argv: &["hostname"],
            output: "web-prod-02\n",
        },
        CannedCommand {
            argv: &["pwd"],
            output: "/root\n",
        },
        CannedCommand {
            argv: &["cat", "/proc/version"],
            output: "Linux version 5.4.0-169-generic (buildd@lcy02-amd64-102) (gcc version 9.4.0 (Ubuntu 9.4.0-1ubuntu1~20.04.2)) #187-Ubuntu SMP Thu Nov 23 14:52:28 UTC 2023\n",
        },
        CannedCommand {
            argv: &["cat", "/etc/issue"],
            output: "Ubuntu 20.04.6 LTS \\n \\l\n\n",
        },
    ],
};

pub static CENTOS: Persona = Persona {
    name: "centos-7",
    hostname: "db01",
    issue: "CentOS Linux 7 (Core)\nKernel 3.10.0-1160.el7.x86_64 on an x86_64\n",
    banner: "Last login: Tue Mar 12 02:40:17 2024 from 172.16.4.21\n",
    login_prompt: "db01 login: ",
    password_prompt: "Password: ",
    shell_prompt: "[root@db01 ~]# ",
    identity: "Linux db01 3.10.0-1160.el7.x86_64 #1 SMP Mon Oct 19 16:18:59 UTC 2020 x86_64 x86_64 x86_64 GNU/Linux\n",
    commands: &[
        CannedCommand {
            argv: &["id", "-a"],
            output: "uid=0(root) gid=0(root) groups=0(root) context=unconfined_u:unconfined_r:unconfined_t:s0-s0:c0.c1023\n",
        },
        CannedCommand {
            argv: &["whoami"],
            output: "root\n",
        },
        CannedCommand {
            argv: &["hostname"],
            output: "db01\n",
        },
        CannedCommand {
            argv: &["pwd"],
            output: "/root\n",
        },
        CannedCommand {
            argv: &["cat", "/proc/version"],
            output: "Linux version 3.10.0-1160.el7.x86_64 (mockbuild@kbuilder.bsys.centos.org) (gcc version 4.8.5 20150623 (Red Hat 4.8.5-44) (GCC) ) #1 SMP Mon Oct 19 16:18:59 UTC 2020\n",
        },
        CannedCommand {
            argv: &["cat", "/etc/redhat-release"],
            output: "CentOS Linux release 7.9.2009 (Core)\n",
        },
    ],
};

pub static BUSYBOX_ROUTER: Persona = Persona {
    name: "busybox-router",
    hostname: "OpenWrt",
    issue: "OpenWrt 19.07.10\n",
    banner: "\nBusyBox v1.30.1 () built-in shell (ash)\n\n\
  _______                     ________        __\n \
|       |.-----.-----.-----.|  |  |  |.----.|  |_\n \
|   -   ||  _  |  -__|     ||  |  |  ||   _||   _|\n \
|_______||   __|_____|__|__||________||__|  |____|\n          \
|__| W I R E L E S S   F R E E D O M\n",
    login_prompt: "OpenWrt login: ",
    password_prompt: "Password: ",
    shell_prompt: "root@OpenWrt:~# ",
    identity: "Linux OpenWrt 4.14.275 #0 Sat Apr 23 09:42:37 2022 mips GNU/Linux\n",
    commands: &[
        CannedCommand {
            argv: &["id", "-a"],
            output: "uid=0(root) gid=0(root)\n",
        },
        CannedCommand {
            argv: &["whoami"],
            output: "root\n",
        },
        CannedCommand {
            argv: &["cat", "/proc/version"],
            output: "Linux version 4.14.275 (builder@buildhost) (gcc version 7.5.0 (OpenWrt GCC 7.5.0 r11427-9ce6aa9d8d)) #0 Sat Apr 23 09:42:37 2022\n",
        },
        CannedCommand {
            argv: &["cat", "/proc/cpuinfo"],
            output: "system type\t\t: MediaTek MT7621 ver:1 eco:3\n\
machine\t\t\t: Xiaomi Mi Router 4A Gigabit Edition\n\
processor\t\t: 0\n\
cpu model\t\t: MIPS 1004Kc V2.15\n\
BogoMIPS\t\t: 586.13\n",
        },
        CannedCommand {
            argv: &["busybox"],
            output: "BusyBox v1.30.1 () multi-call binary.\n",
        },
    ],
};

pub static PERSONAS: [&Persona; 3] = [&UBUNTU, &CENTOS, &BUSYBOX_ROUTER];

pub fn find(name: &str) -> Option<&'static Persona> {
    PERSONAS.iter().copied().find(|p| p.name == name)
}

/// Uniform choice over a fixed candidate set.
#[derive(Debug, Clone)]
pub struct PersonaSelector {
    candidates: Vec<&'static Persona>,
}

impl PersonaSelector {
    pub fn all() -> Self {
        Self {
            candidates: PERSONAS.to_vec(),
        }
    }

    /// Narrows the set to the named personas. An empty list means all of them.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Ok(Self::all());
        }

        let mut candidates = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let persona =
                find(name).ok_or_else(|| ConfigError::UnknownPersona(name.to_string()))?;
            if !candidates.contains(&persona) {
                candidates.push(persona);
            }
        }
        debug!("Persona set narrowed to {} entries", candidates.len());
        Ok(Self { candidates })
    }

    pub fn candidates(&self) -> &[&'static Persona] {
        &self.candidates
    }

    pub fn select(&self, rng: &mut dyn RngCore) -> Option<&'static Persona> {
        self.candidates.choose(rng).copied()
    }
}

impl Default for PersonaSelector {
    fn default() -> Self {
        Self::all()
    }
}
