//! Sequenced import of the proprietary-format datasets.
//!
//! One run stages every dataset listed in [`IMPORT_TASKS`]: archive members
//! are extracted (skipping files already on disk), derived artifacts are
//! compiled idempotently, and each staging table is dropped and recreated
//! from scratch. A failure on any task aborts the remaining tasks — there is
//! no partial-success continuation.

use std::fs::{self, File};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use kerbside_core::{Database, DatabaseError, ExternalToolError, GlobalSettings, TabularLoader};
use log::info;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use super::compile::{ensure_data_file, ensure_schema_file};
use super::error::GipCompileError;

/// One proprietary-format dataset to stage: source file, target table, and
/// the columns keyed after the bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportTask {
    /// Export file name inside the archive.
    pub file_name: &'static str,
    /// Staging table the file loads into.
    pub table: &'static str,
    /// Unique key applied after the load completes.
    pub key_columns: &'static [&'static str],
}

impl ImportTask {
    fn file_stem(&self) -> &'static str {
        Utf8Path::new(self.file_name)
            .file_stem()
            .unwrap_or(self.file_name)
    }
}

/// The datasets staged by every proprietary-format run.
pub const IMPORT_TASKS: &[ImportTask] = &[
    ImportTask {
        file_name: "BikeHike.txt",
        table: "gip_bikehike",
        key_columns: &["use_id"],
    },
    ImportTask {
        file_name: "Link.txt",
        table: "gip_link",
        key_columns: &["link_id"],
    },
    ImportTask {
        file_name: "LinkCoordinate.txt",
        table: "gip_linkcoordinate",
        key_columns: &["link_id", "count"],
    },
    ImportTask {
        file_name: "LinkUse.txt",
        table: "gip_linkuse",
        key_columns: &["use_id"],
    },
    ImportTask {
        file_name: "Link2ReferenceObject.txt",
        table: "gip_link2referenceobject",
        key_columns: &["idseq"],
    },
    ImportTask {
        file_name: "Node.txt",
        table: "gip_node",
        key_columns: &["node_id"],
    },
    ImportTask {
        file_name: "ReferenceObject.txt",
        table: "gip_referenceobject",
        key_columns: &["refobj_id"],
    },
];

/// Errors raised during a proprietary-format import run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GipImportError {
    /// The source archive could not be opened.
    #[error("failed to open export archive {path:?}")]
    OpenArchive {
        /// Archive path inside the data directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The source archive is unreadable as a zip file.
    #[error("failed to read export archive {path:?}")]
    ReadArchive {
        /// Archive path inside the data directory.
        path: Utf8PathBuf,
        /// Source error from the archive reader.
        #[source]
        source: ZipError,
    },
    /// A required member file is absent from the archive.
    #[error("archive {path:?} has no member {name:?}")]
    MissingArchiveMember {
        /// Archive path inside the data directory.
        path: Utf8PathBuf,
        /// Member file that was requested.
        name: &'static str,
    },
    /// Extracting a member to the destination directory failed.
    #[error("failed to extract {name:?} to {path:?}")]
    ExtractMember {
        /// Destination path of the member.
        path: Utf8PathBuf,
        /// Member file being extracted.
        name: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Compiling an export file into derived artifacts failed.
    #[error(transparent)]
    Compile(#[from] GipCompileError),
    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// The delegated bulk loader failed.
    #[error(transparent)]
    Load(#[from] ExternalToolError),
}

/// Summary of a completed proprietary-format run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GipImportReport {
    /// Directory the archive members were extracted into.
    pub extract_directory: Utf8PathBuf,
    /// Staging tables created, in task order.
    pub tables: Vec<&'static str>,
}

/// Importer for the proprietary fixed-schema export archive.
#[derive(Debug)]
pub struct GipImporter<'a> {
    settings: &'a GlobalSettings,
    schema: &'a str,
    archive_file_name: &'a str,
}

impl<'a> GipImporter<'a> {
    /// Construct an importer for the archive named `archive_file_name`
    /// inside the settings' data directory.
    #[must_use]
    pub fn new(settings: &'a GlobalSettings, schema: &'a str, archive_file_name: &'a str) -> Self {
        Self {
            settings,
            schema,
            archive_file_name,
        }
    }

    /// Run the import: extract, compile, stage and key every task.
    ///
    /// # Errors
    /// Any failure is run-fatal and aborts the remaining tasks; see
    /// [`GipImportError`].
    pub fn run(
        &self,
        db: &mut dyn Database,
        loader: &dyn TabularLoader,
    ) -> Result<GipImportReport, GipImportError> {
        info!("importing gip from {:?}", self.archive_file_name);
        db.ensure_extensions_and_schema(self.schema)?;

        let extract_directory = self.extract_archive()?;

        let mut tables = Vec::with_capacity(IMPORT_TASKS.len());
        for task in IMPORT_TASKS {
            info!("create table \"{}\"", task.table);
            let source = extract_directory.join(task.file_name);
            let data_file = ensure_data_file(&source)?;
            ensure_schema_file(&source)?;

            // Staging tables are always rebuilt from scratch. The commit
            // after schema creation isolates bulk-load failures from DDL.
            db.drop_table(task.table, self.schema)?;
            db.execute_file(task.file_stem(), &extract_directory)?;
            db.commit()?;

            loader.load_delimited(&data_file, self.schema, task.table)?;

            db.add_primary_key(task.table, task.key_columns, self.schema)?;
            db.commit()?;
            tables.push(task.table);
        }

        db.close()?;
        Ok(GipImportReport {
            extract_directory,
            tables,
        })
    }

    /// Extract the task members from the archive, skipping files that are
    /// already present at the destination.
    fn extract_archive(&self) -> Result<Utf8PathBuf, GipImportError> {
        let archive_path = self.settings.data_path(self.archive_file_name);
        let stem = Utf8Path::new(self.archive_file_name)
            .file_stem()
            .unwrap_or(self.archive_file_name);
        let destination = self.settings.data_path(stem);

        let file = File::open(&archive_path).map_err(|source| GipImportError::OpenArchive {
            path: archive_path.clone(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(file).map_err(|source| GipImportError::ReadArchive {
                path: archive_path.clone(),
                source,
            })?;

        for task in IMPORT_TASKS {
            let target = destination.join(task.file_name);
            if target.exists() {
                continue;
            }
            fs::create_dir_all(&destination).map_err(|source| GipImportError::ExtractMember {
                path: destination.clone(),
                name: task.file_name,
                source,
            })?;
            let mut member = match archive.by_name(task.file_name) {
                Ok(member) => member,
                Err(ZipError::FileNotFound) => {
                    return Err(GipImportError::MissingArchiveMember {
                        path: archive_path,
                        name: task.file_name,
                    });
                }
                Err(source) => {
                    return Err(GipImportError::ReadArchive {
                        path: archive_path,
                        source,
                    });
                }
            };
            let mut sink =
                File::create(&target).map_err(|source| GipImportError::ExtractMember {
                    path: target.clone(),
                    name: task.file_name,
                    source,
                })?;
            io::copy(&mut member, &mut sink).map_err(|source| GipImportError::ExtractMember {
                path: target.clone(),
                name: task.file_name,
                source,
            })?;
        }

        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kerbside_core::test_support::{RecordingDatabase, RecordingTabularLoader};
    use rstest::{fixture, rstest};
    use std::io::Write as _;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    fn export_content(table: &str, key: &str) -> String {
        format!("tbl;{table}\natr;{key};descr\nfrm;decimal(9);string\nrec;\"1\";\"first\"\n")
    }

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn settings_for(dir: &TempDir) -> GlobalSettings {
        let data_directory = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("utf-8 temp dir");
        toml::from_str(&format!(
            "data_directory = \"{data_directory}\"\ntarget_srid = 32633\n"
        ))
        .expect("settings should parse")
    }

    fn write_archive(dir: &TempDir, name: &str) {
        let path = dir.path().join(name);
        let file = File::create(path).expect("create archive");
        let mut writer = ZipWriter::new(file);
        for task in IMPORT_TASKS {
            writer
                .start_file(task.file_name, FileOptions::default())
                .expect("start archive member");
            let key = task.key_columns.first().expect("task has a key column");
            writer
                .write_all(export_content(task.file_stem(), key).as_bytes())
                .expect("write archive member");
        }
        writer.finish().expect("finish archive");
    }

    #[rstest]
    fn stages_every_task_in_order(temp_dir: TempDir) {
        let settings = settings_for(&temp_dir);
        write_archive(&temp_dir, "ogd_gip.zip");
        let mut db = RecordingDatabase::new();
        let loader = RecordingTabularLoader::new();

        let report = GipImporter::new(&settings, "geo", "ogd_gip.zip")
            .run(&mut db, &loader)
            .expect("run should succeed");

        let expected: Vec<&str> = IMPORT_TASKS.iter().map(|task| task.table).collect();
        assert_eq!(report.tables, expected);
        assert_eq!(loader.calls().len(), IMPORT_TASKS.len());
        assert!(db.is_closed());

        // Per task: drop, create from file, commit, key, commit.
        let ops = db.operations();
        assert_eq!(ops.first().map(String::as_str), Some("ensure_extensions_and_schema:geo"));
        let first_task = &ops[1..6];
        let extract_dir = report.extract_directory.as_str();
        assert_eq!(
            first_task,
            [
                "drop_table:geo.gip_bikehike".to_owned(),
                format!("execute_file:{extract_dir}/BikeHike.sql"),
                "commit".to_owned(),
                "add_primary_key:geo.gip_bikehike:use_id".to_owned(),
                "commit".to_owned(),
            ]
        );
    }

    #[rstest]
    fn bulk_load_happens_between_the_commits(temp_dir: TempDir) {
        let settings = settings_for(&temp_dir);
        write_archive(&temp_dir, "ogd_gip.zip");
        let mut db = RecordingDatabase::new();
        let loader = RecordingTabularLoader::new();

        let report = GipImporter::new(&settings, "geo", "ogd_gip.zip")
            .run(&mut db, &loader)
            .expect("run should succeed");

        let (path, schema, table) = loader.calls().into_iter().next().expect("loader called");
        assert_eq!(path, report.extract_directory.join("BikeHike.csv"));
        assert_eq!(schema, "geo");
        assert_eq!(table, "gip_bikehike");
    }

    #[rstest]
    fn extraction_skips_members_already_on_disk(temp_dir: TempDir) {
        let settings = settings_for(&temp_dir);
        write_archive(&temp_dir, "ogd_gip.zip");
        let extract_dir = settings.data_path("ogd_gip");
        fs::create_dir_all(&extract_dir).expect("create extract dir");
        let sentinel = extract_dir.join("Link.txt");
        fs::write(&sentinel, export_content("link", "link_id")).expect("write sentinel");
        let before = fs::metadata(&sentinel).expect("sentinel metadata").len();

        let mut db = RecordingDatabase::new();
        let loader = RecordingTabularLoader::new();
        GipImporter::new(&settings, "geo", "ogd_gip.zip")
            .run(&mut db, &loader)
            .expect("run should succeed");

        let after = fs::metadata(&sentinel).expect("sentinel metadata").len();
        assert_eq!(before, after, "existing member must not be re-extracted");
    }

    #[rstest]
    fn loader_failure_aborts_the_remaining_tasks(temp_dir: TempDir) {
        let settings = settings_for(&temp_dir);
        write_archive(&temp_dir, "ogd_gip.zip");
        let mut db = RecordingDatabase::new();
        let loader = RecordingTabularLoader::failing();

        let outcome = GipImporter::new(&settings, "geo", "ogd_gip.zip").run(&mut db, &loader);

        assert!(matches!(outcome, Err(GipImportError::Load(_))));
        assert_eq!(loader.calls().len(), 1, "first failure stops the run");
        assert!(!db.is_closed());
    }

    #[rstest]
    fn missing_archive_member_is_reported_by_name(temp_dir: TempDir) {
        let settings = settings_for(&temp_dir);
        let path = temp_dir.path().join("ogd_gip.zip");
        let file = File::create(path).expect("create archive");
        let mut writer = ZipWriter::new(file);
        writer
            .start_file("Unrelated.txt", FileOptions::default())
            .expect("start archive member");
        writer.finish().expect("finish archive");

        let mut db = RecordingDatabase::new();
        let loader = RecordingTabularLoader::new();
        let outcome = GipImporter::new(&settings, "geo", "ogd_gip.zip").run(&mut db, &loader);

        assert!(matches!(
            outcome,
            Err(GipImportError::MissingArchiveMember {
                name: "BikeHike.txt",
                ..
            })
        ));
    }
}
