//! The demo's command tree.
//!
//! ```text
//! cobravsviper          debug*, log-level*, log-format*, rootpersistentflag1-4*,
//! │                     toggle (-t), rootflag1-4
//! ├── version           versionflag1-4
//! │   └── details       detailsflag1-4
//! ├── grp1cmd1
//! ├── grp1cmd2
//! ├── grp2cmd1
//! └── grp2cmd2          grp2cmd2persistentflag1-4*, grp2cmd2flag1-4
//!     ├── sub221        sub221flag1-4, sub221flagnovar1-4
//!     └── zu-lu-sub221  zu-lu-sub221flag1-4
//! ```
//!
//! `*` marks persistent options. Every string flag defaults to
//! `"value from default"` so it is obvious in the output which layer won.

use cmdfig::{CmdfigError, CommandTree, NodeId, OptionSpec, TreeBuilder};

pub const APP: &str = "cobravsviper";
const DEFAULT: &str = "value from default";

fn numbered(b: &mut TreeBuilder, node: NodeId, stem: &str, help: &str, default: &str, persistent: bool) {
    for i in 1..=4 {
        let mut spec = OptionSpec::string(&format!("{stem}{i}"), default).help(&format!("{help} {i}"));
        if persistent {
            spec = spec.persistent();
        }
        b.option(node, spec);
    }
}

pub fn command_tree() -> Result<CommandTree, CmdfigError> {
    let mut b = CommandTree::builder(APP);
    let root = b.root();
    b.about(root, "The ROOT command")
        .option(
            root,
            OptionSpec::bool("debug", false)
                .persistent()
                .help("Log at debug level (same as --log-level=debug)"),
        )
        .option(
            root,
            OptionSpec::string("log-level", "info")
                .persistent()
                .help("Log level: trace, debug, info, warning or error"),
        )
        .option(
            root,
            OptionSpec::string("log-format", "text")
                .persistent()
                .help("Log output format: text or json"),
        )
        .option(
            root,
            OptionSpec::bool("toggle", false).short('t').help("Help message for toggle"),
        );
    numbered(&mut b, root, "rootpersistentflag", "persistent root flag", DEFAULT, true);
    numbered(&mut b, root, "rootflag", "root flag", DEFAULT, false);

    let version = b.command(root, "version");
    b.about(version, "A SUBcommand");
    numbered(&mut b, version, "versionflag", "version flag", "from default", false);

    let details = b.command(version, "details");
    b.about(details, "A nested SUBcommand");
    numbered(&mut b, details, "detailsflag", "details flag", DEFAULT, false);

    for name in ["grp1cmd1", "grp1cmd2", "grp2cmd1"] {
        let id = b.command(root, name);
        b.about(id, "A command without options of its own");
    }

    let grp2cmd2 = b.command(root, "grp2cmd2");
    b.about(grp2cmd2, "Test Nested Command");
    numbered(&mut b, grp2cmd2, "grp2cmd2persistentflag", "grp2cmd2 persistent flag", DEFAULT, true);
    numbered(&mut b, grp2cmd2, "grp2cmd2flag", "grp2cmd2 flag", DEFAULT, false);

    let sub221 = b.command(grp2cmd2, "sub221");
    b.about(sub221, "Test Nested Command of 2nd Level");
    numbered(&mut b, sub221, "sub221flag", "sub221 flag", DEFAULT, false);
    for i in 1..=4 {
        b.option(
            sub221,
            OptionSpec::string(&format!("sub221flagnovar{i}"), &format!("{DEFAULT} 0.0.0.{i}"))
                .help("A flag read only through the resolved config"),
        );
    }

    let zulu = b.command(grp2cmd2, "zu-lu-sub221");
    b.about(zulu, "A hyphenated nested command");
    numbered(&mut b, zulu, "zu-lu-sub221flag", "zu-lu-sub221 flag", DEFAULT, false);

    b.build()
}
