//! The stock tasks of a site build and the pipeline composed from them.

mod assets;
mod cdn;
mod clean;
mod fingerprint;
mod styles;
mod templates;
mod vendor;

pub use assets::CopyAssets;
pub use cdn::ExternalizeCdn;
pub use clean::Clean;
pub use fingerprint::{Fingerprint, RevManifest};
pub use styles::CompileStyles;
pub use templates::CompileTemplates;
pub use vendor::CopyVendor;

use crate::config::Profile;
use crate::engine::{Blueprint, Step, Website, parallel, run, series};

/// The composite run by watch mode before it starts watching.
pub const WATCH: &str = "watch";

/// The composite producing a deployable tree.
pub const BUILD: &str = "build";

fn compile_all() -> Step {
    parallel([
        run("copy-vendor"),
        run("compile-templates"),
        run("compile-styles"),
        run("copy-assets"),
    ])
}

/// Register every task, the `build` and `watch` composites and the short
/// aliases.
///
/// `build` cleans, then compiles everything concurrently. Profiles with
/// fingerprinting then rename the output and point it at the CDN.
pub fn pipeline(profile: &Profile) -> Website {
    let mut config = Blueprint::new();

    config
        .add_task(Clean)
        .add_task(CompileStyles)
        .add_task(CompileTemplates::new())
        .add_task(CopyAssets)
        .add_task(CopyVendor)
        .add_task(Fingerprint)
        .add_task(ExternalizeCdn);

    let mut build = vec![run("clean"), compile_all()];
    if profile.fingerprint.enabled {
        build.push(run("fingerprint"));
        build.push(run("externalize-cdn"));
    }

    config
        .compose(BUILD, series(build))
        .compose(WATCH, compile_all())
        .alias("sass", "compile-styles")
        .alias("pug", "compile-templates")
        .alias("copy", "copy-assets")
        .alias("vendor", "copy-vendor")
        .alias("rev", "fingerprint")
        .alias("cdnize", "externalize-cdn");

    config.finish()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;
    use crate::core::{Environment, Mode};
    use crate::io::write;

    #[test]
    fn test_task_names() {
        let website = pipeline(&Profile::development());
        let names = website.task_names();

        for name in [
            "build",
            "watch",
            "clean",
            "compile-styles",
            "sass",
            "compile-templates",
            "pug",
            "copy-assets",
            "copy",
            "copy-vendor",
            "vendor",
            "fingerprint",
            "rev",
            "externalize-cdn",
            "cdnize",
        ] {
            assert!(names.contains(&name), "missing {name}");
        }
    }

    #[test]
    fn test_build_plans() {
        let website = pipeline(&Profile::development());
        assert_eq!(website.plan(BUILD).unwrap().node_count(), 5);

        let website = pipeline(&Profile::online());
        let plan = website.plan(BUILD).unwrap();
        assert_eq!(plan.node_count(), 7);
        // clean fans out to four tasks which all join into fingerprint,
        // followed by the cdn rewrite
        assert_eq!(plan.edge_count(), 4 + 4 + 1);
    }

    #[test]
    fn test_online_build() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        write(&root.join("src/_includes/head.jinja"), "<link href=\"/css/style.default.css\">\n").unwrap();
        write(
            &root.join("src/index.jinja"),
            "{% include '_includes/head.jinja' %}\n<img src=\"img/logo.png\">\n",
        )
        .unwrap();
        write(&root.join("src/scss/style.default.scss"), ".a { color: red; }\n").unwrap();
        write(&root.join("src/img/logo.png"), "png").unwrap();
        write(&root.join("src/favicon.png"), "icon").unwrap();
        write(&root.join("tmp/stale.txt"), "left over").unwrap();

        let profile = Profile::online();
        let website = pipeline(&profile);
        let env = Environment::new(profile, root.clone(), Mode::Build);

        let diagnostics = website.run("build", &env).unwrap();
        assert_eq!(diagnostics.execution_times.len(), 7);

        assert!(!root.join("tmp/stale.txt").exists());
        assert!(root.join("online/favicon.png").is_file());
        assert!(root.join("online/rev-manifest.json").is_file());

        let index = fs::read_to_string(root.join("online/index.html")).unwrap();
        assert!(!index.contains("/css/style.default.css"));
        assert!(index.contains("/css/style.default."));
        assert!(!index.contains("\"img/logo.png\""));
    }

    #[test]
    fn test_standalone_task_does_not_clean() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        write(&root.join("dist/keep.txt"), "keep").unwrap();
        write(&root.join("src/img/logo.png"), "png").unwrap();

        let profile = Profile::development();
        let website = pipeline(&profile);
        let env = Environment::new(profile, root.clone(), Mode::Build);

        website.run("copy", &env).unwrap();

        assert!(root.join("dist/keep.txt").is_file());
        assert!(root.join("dist/img/logo.png").is_file());
    }
}
