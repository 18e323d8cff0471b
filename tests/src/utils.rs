use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Stand-in for masscan: every scan writes a canned report as its capture,
/// `--readscan` copies the capture to the requested XML file.
const FAKE_MASSCAN: &str = r#"#!/bin/sh
if [ "$1" = "-V" ]; then
    echo "Masscan version 1.3.2 ( https://github.com/robertdavidgraham/masscan )"
    exit 0
fi
if [ "$1" = "--readscan" ]; then
    cp "$2" "$4"
    exit 0
fi
echo "$@" >> "$(dirname "$0")/masscan.calls"

raw=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "-oB" ]; then raw="$arg"; fi
    prev="$arg"
done

case "$raw" in
    *stage_1*)
        cat > "$raw" <<'XML'
<?xml version="1.0"?>
<nmaprun scanner="masscan" start="1700000010">
<host><address addr="10.0.0.5" addrtype="ipv4"/><ports><port protocol="tcp" portid="22"><state state="open"/></port></ports></host>
</nmaprun>
XML
        echo "Discovered open port 22/tcp on 10.0.0.5"
        printf 'rate:  0.00-kpps, 100.00%% done,   0:00:00 remaining, found=1\r' >&2
        ;;
    *stage_2*)
        cat > "$raw" <<'XML'
<?xml version="1.0"?>
<nmaprun scanner="masscan" start="1700000020">
<host><address addr="10.0.0.5" addrtype="ipv4"/><ports><port protocol="tcp" portid="8080"><state state="open"/></port></ports></host>
</nmaprun>
XML
        echo "Discovered open port 8080/tcp on 10.0.0.5"
        ;;
    *swamp*)
        cat > "$raw" <<'XML'
<?xml version="1.0"?>
<nmaprun scanner="masscan" start="1700000030">
<host><address addr="10.0.0.77" addrtype="ipv4"/><ports><port protocol="tcp" portid="4444"><state state="open"/></port></ports></host>
</nmaprun>
XML
        echo "Discovered open port 4444/tcp on 10.0.0.77"
        ;;
    *)
        : > "$raw"
        ;;
esac
"#;

/// Stand-in for nmap: `$1` is the target and `$3` the XML report path.
const FAKE_NMAP: &str = r#"#!/bin/sh
if [ "$1" = "-V" ]; then
    echo "Nmap version 7.94 ( https://nmap.org )"
    exit 0
fi
echo "$@" >> "$(dirname "$0")/nmap.calls"
target="$1"
xml="$3"
echo "Starting Nmap 7.94 ( https://nmap.org )"

case "$*" in
    *-PR*)
        cat > "$xml" <<XML
<?xml version="1.0"?>
<nmaprun scanner="nmap" args="nmap $target -oX $xml -PR -Pn -sn" start="1700000000">
<host><status state="up" reason="arp-response"/><address addr="10.0.0.1" addrtype="ipv4"/><address addr="AA:BB:CC:00:00:01" addrtype="mac" vendor="Acme"/><hostnames><hostname name="gateway" type="PTR"/></hostnames></host>
<host><status state="up" reason="user-set"/><address addr="10.0.0.9" addrtype="ipv4"/></host>
</nmaprun>
XML
        ;;
    *-sV*)
        cat > "$xml" <<XML
<?xml version="1.0"?>
<nmaprun scanner="nmap" args="nmap $target -oX $xml -sV" start="1700000100">
<host><address addr="$target" addrtype="ipv4"/><hostnames><hostname name="nas" type="PTR"/></hostnames>
<ports><port protocol="tcp" portid="22"><state state="open"/><service name="ssh"/></port></ports></host>
</nmaprun>
XML
        echo "22/tcp open  ssh"
        ;;
esac
echo "Nmap done: 1 IP address (1 host up) scanned in 0.10 seconds"
"#;

pub struct FakeScanners {
    pub dir: PathBuf,
    pub masscan: PathBuf,
    pub nmap: PathBuf,
}

impl FakeScanners {
    pub fn install(dir: &Path) -> Self {
        let bin = dir.join("bin");
        fs::create_dir_all(&bin).unwrap();
        let masscan = write_script(&bin, "masscan", FAKE_MASSCAN);
        let nmap = write_script(&bin, "nmap", FAKE_NMAP);
        Self { dir: bin, masscan, nmap }
    }

    /// Argument lines recorded by the fake `tool`, one per scan.
    pub fn calls(&self, tool: &str) -> Vec<String> {
        fs::read_to_string(self.dir.join(format!("{tool}.calls")))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
