//! Build profiles.
//!
//! A [`Profile`] is an immutable snapshot of every option the tasks read. The
//! three stock profiles mirror the three ways a site is shipped:
//!
//! * **development**: nested styles, incremental templates, live-reload
//!   server, output in `dist/`.
//! * **distribution**: expanded and minified styles with vendor prefixes,
//!   the full documentation allow-list, output in `distribution/`.
//! * **online**: compressed styles, fingerprinted file names, optional CDN
//!   references, staged in `tmp/` and published to `online/`.
//!
//! Profiles are selected once per invocation and never merged at runtime. A
//! profile file only fills in the sections it names, every other section
//! keeps the values of the base profile it was read over.

use std::fmt::Display;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    Development,
    Distribution,
    Online,
}

impl Display for ProfileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileName::Development => write!(f, "development"),
            ProfileName::Distribution => write!(f, "distribution"),
            ProfileName::Online => write!(f, "online"),
        }
    }
}

/// Output style of the compiled stylesheets.
///
/// `Nested` is accepted for compatibility with older profiles, the compiler
/// renders it the same way as `Expanded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    Nested,
    Expanded,
    Compressed,
}

impl From<OutputStyle> for grass::OutputStyle {
    fn from(value: OutputStyle) -> Self {
        match value {
            OutputStyle::Nested | OutputStyle::Expanded => grass::OutputStyle::Expanded,
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    /// Source root, templates are looked up relative to it.
    pub source: Utf8PathBuf,
    /// Output root of the compile and copy tasks.
    pub output: Utf8PathBuf,
    /// Stylesheet directory, relative to the output root.
    pub styles: Utf8PathBuf,
    /// Vendor directory, relative to the output root.
    pub vendor: Utf8PathBuf,
    /// Published directory for fingerprinted builds.
    pub final_output: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleOptions {
    /// Glob of the entry stylesheets, relative to the source root.
    pub entry: String,
    /// Glob of every stylesheet which can affect the entries.
    pub watch: String,
    pub output_style: OutputStyle,
    /// Paths searched by `@use` and `@import`, relative to the project root.
    pub include_paths: Vec<Utf8PathBuf>,
    /// Add vendor-prefixed twins of selected declarations.
    pub prefix: bool,
    /// Write an additional compressed `.min.css` with a source map.
    pub minify: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locals {
    pub style_switcher: bool,
    pub no_index: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateOptions {
    /// Glob of the templates, relative to the source root.
    pub glob: String,
    /// Partials directory, relative to the source root. Partials never
    /// produce output on their own.
    pub partials: Utf8PathBuf,
    /// Only rebuild templates that changed or depend on a changed partial.
    pub incremental: bool,
    pub locals: Locals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetOptions {
    /// Allow-list of globs relative to the source root.
    pub copy: Vec<String>,
    /// Globs which trigger a copy in watch mode.
    pub watch: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorOptions {
    /// Package manifest listing the production dependencies.
    pub manifest: Utf8PathBuf,
    /// Installed packages directory.
    pub packages: Utf8PathBuf,
    /// Path segments removed from every copied path.
    pub strip: Vec<String>,
    /// Globs of package files which are never copied.
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintOptions {
    pub enabled: bool,
    /// Globs of files which keep their name and whose references are kept.
    pub exclude: Vec<String>,
    /// Number of hex characters embedded into file names.
    pub length: usize,
    /// Name of the manifest written into the published directory.
    pub manifest: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdnOptions {
    pub enabled: bool,
    pub base: String,
    /// Globs of referenced files which are served from the CDN.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    pub enabled: bool,
    pub port: u16,
}

/// An immutable set of options selected for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: ProfileName,
    pub paths: Paths,
    pub styles: StyleOptions,
    pub templates: TemplateOptions,
    pub assets: AssetOptions,
    pub vendor: VendorOptions,
    pub fingerprint: FingerprintOptions,
    pub cdn: CdnOptions,
    pub server: ServerOptions,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Profile {
    pub fn development() -> Self {
        Self {
            name: ProfileName::Development,
            paths: Paths {
                source: "src".into(),
                output: "dist".into(),
                styles: "css".into(),
                vendor: "vendor".into(),
                final_output: None,
            },
            styles: StyleOptions {
                entry: "scss/style.*.scss".into(),
                watch: "scss/**/*.scss".into(),
                output_style: OutputStyle::Nested,
                include_paths: vec!["src/scss".into(), "src/scss/modules".into()],
                prefix: false,
                minify: false,
            },
            templates: TemplateOptions {
                glob: "**/*.jinja".into(),
                partials: "_includes".into(),
                incremental: true,
                locals: Locals::default(),
            },
            assets: AssetOptions {
                copy: strings(&["js/**", "img/**", "css/**", "fonts/**", "icons/**", "favicon.png"]),
                watch: strings(&["img/**", "js/**"]),
            },
            vendor: VendorOptions {
                manifest: "package.json".into(),
                packages: "node_modules".into(),
                strip: strings(&["dist", "distribute"]),
                exclude: strings(&[
                    "*.map",
                    "src/**/*",
                    "examples/**/*",
                    "example/**/*",
                    "demo/**/*",
                    "spec/**/*",
                    "docs/**/*",
                    "tests/**/*",
                    "test/**/*",
                    "node_modules/**/*",
                    "Gruntfile.js",
                    "gulpfile.js",
                    "package.json",
                    "package-lock.json",
                    "bower.json",
                    "composer.json",
                    "yarn.lock",
                    "webpack.config.js",
                    "README",
                    "LICENSE",
                    "CHANGELOG",
                    "*.yml",
                    "*.md",
                    "*.coffee",
                    "*.ts",
                    "*.scss",
                    "*.less",
                ]),
            },
            fingerprint: FingerprintOptions {
                enabled: false,
                exclude: strings(&["favicon.png", "**/*.html", "**/vendor/**"]),
                length: 8,
                manifest: Some("rev-manifest.json".into()),
            },
            cdn: CdnOptions {
                enabled: false,
                base: String::new(),
                files: strings(&["img/**", "vendor/**", "css/**"]),
            },
            server: ServerOptions {
                enabled: true,
                port: 8080,
            },
        }
    }

    pub fn distribution() -> Self {
        let mut profile = Self::development();
        profile.name = ProfileName::Distribution;
        profile.paths.output = "distribution".into();
        profile.styles.output_style = OutputStyle::Expanded;
        profile.styles.prefix = true;
        profile.styles.minify = true;
        profile.templates.incremental = false;
        profile.assets.copy = strings(&[
            "js/**",
            "css/**",
            "img/**",
            "docs/**",
            "icons/**",
            "fonts/**",
            "favicon.png",
            "readme.txt",
            "license.txt",
            "credits.txt",
            "custom-icons/**",
        ]);
        profile.server.enabled = false;
        profile
    }

    pub fn online() -> Self {
        let mut profile = Self::development();
        profile.name = ProfileName::Online;
        profile.paths.output = "tmp".into();
        profile.paths.final_output = Some("online".into());
        profile.styles.output_style = OutputStyle::Compressed;
        profile.styles.prefix = true;
        profile.templates.incremental = false;
        profile.templates.locals = Locals {
            style_switcher: true,
            no_index: true,
        };
        profile.assets.copy =
            strings(&["js/**", "img/**", "icons/**", "css/**", "fonts/**", "favicon.png"]);
        profile.fingerprint.enabled = true;
        profile.server.enabled = false;
        profile
    }

    pub fn named(name: ProfileName) -> Self {
        match name {
            ProfileName::Development => Self::development(),
            ProfileName::Distribution => Self::distribution(),
            ProfileName::Online => Self::online(),
        }
    }

    /// Reads a profile file over the stock profile `base`.
    ///
    /// Every top-level section present in the file replaces the base
    /// section wholesale; a partial section falls back to the base values
    /// for its missing fields.
    pub fn from_file(base: ProfileName, path: &Utf8Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(base, &text)
    }

    pub fn from_json(base: ProfileName, text: &str) -> anyhow::Result<Self> {
        let overlay: serde_json::Value = serde_json::from_str(text)?;
        let mut value = serde_json::to_value(Self::named(base))?;

        if let (Some(target), Some(source)) = (value.as_object_mut(), overlay.as_object()) {
            for (key, section) in source {
                match (target.get_mut(key), section) {
                    (Some(serde_json::Value::Object(into)), serde_json::Value::Object(from)) => {
                        for (field, v) in from {
                            into.insert(field.clone(), v.clone());
                        }
                    }
                    _ => {
                        target.insert(key.clone(), section.clone());
                    }
                }
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}
