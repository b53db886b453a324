#[cfg(test)]
pub mod test {
    use crate::tree::{CommandTree, OptionSpec};
    use crate::types::Map;

    /// A small tree shaped like a typical nested CLI:
    ///
    /// ```text
    /// app            verbose*, log-level*, name
    /// ├── serve      host, port, ratio
    /// └── db         url*, pool-size
    ///     ├── migrate   dry-run, labels
    ///     └── zu-lu     foo
    /// ```
    ///
    /// `*` marks persistent options.
    pub fn sample_tree() -> CommandTree {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::bool("verbose", false).persistent().short('v'))
            .option(root, OptionSpec::string("log-level", "info").persistent())
            .option(root, OptionSpec::string("name", "app"));

        let serve = b.command(root, "serve");
        b.option(serve, OptionSpec::string("host", "localhost"))
            .option(serve, OptionSpec::int("port", 8080))
            .option(serve, OptionSpec::float("ratio", 0.5));

        let db = b.command(root, "db");
        b.option(db, OptionSpec::string("url", "sqlite://local.db").persistent())
            .option(db, OptionSpec::int("pool-size", 5));

        let migrate = b.command(db, "migrate");
        b.option(migrate, OptionSpec::bool("dry-run", false))
            .option(migrate, OptionSpec::map("labels", Map::new()));

        let zulu = b.command(db, "zu-lu");
        b.option(zulu, OptionSpec::string("foo", "d"));

        b.build().unwrap()
    }

    /// `root` with a single subcommand `sub` declaring `foo = "d"`.
    pub fn scenario_tree() -> CommandTree {
        let mut b = CommandTree::builder("root");
        let root = b.root();
        let sub = b.command(root, "sub");
        b.option(sub, OptionSpec::string("foo", "d"));
        b.build().unwrap()
    }
}
