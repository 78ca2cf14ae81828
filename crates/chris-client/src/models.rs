//! Resources of the ChRIS backend.
//!
//! Plain records are returned as is. Connected models keep the session of the
//! client which produced them, so that they can follow their own links: a
//! plugin instance's `get_feed` requests the URL in its own `feed` field.

use crate::enums::{ParameterType, ParameterValue, PluginType, Status};
use chris_core::{
    connected_model, dispatch, link_set, plain_model, route_link, Error, QueryParams, Result,
    Search,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Default time [`PluginInstance::wait_until_finished`] waits for.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time between two status checks of [`PluginInstance::wait_until_finished`].
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// A compute resource, where plugin instances run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeResource {
    /// URL of this compute resource
    pub url: String,
    /// ID number
    pub id: u32,
    /// When it was created
    pub creation_date: DateTime<Utc>,
    /// When it was last modified
    pub modification_date: DateTime<Utc>,
    /// Unique name
    pub name: String,
    /// URL of the pfcon service
    pub compute_url: String,
    /// URL used to authenticate with pfcon
    pub compute_auth_url: String,
    /// Description
    pub description: String,
    /// Maximum run time of a plugin instance, in seconds
    pub max_job_exec_seconds: i64,
}

plain_model!(ComputeResource);

/// The name, which is how a compute resource is referred to in requests.
impl AsRef<str> for ComputeResource {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    /// URL of this user
    pub url: String,
    /// ID number
    pub id: u32,
    /// Username
    pub username: String,
    /// Email address
    pub email: String,
}

plain_model!(UserData);
link_set!(UserData { url });

connected_model! {
    /// The account of a logged in user.
    pub struct User(UserData) {}
}

/// Fields of a [`PublicPlugin`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublicPluginData {
    /// URL of this plugin
    pub url: String,
    /// ID number
    pub id: u32,
    /// Name, e.g. `pl-dircopy`
    pub name: String,
    /// Version string
    pub version: String,
    /// Container image
    pub dock_image: String,
    /// Source code repository
    pub public_repo: String,
    /// Compute resources this plugin is registered to
    pub compute_resources: String,
    /// Parameters of this plugin
    pub parameters: String,
    /// Plugin type
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
}

link_set!(PublicPluginData {
    url,
    compute_resources,
    parameters
});

connected_model! {
    /// A plugin, as seen without logging in.
    pub struct PublicPlugin(PublicPluginData) {
        get_compute_resources => "compute_resources",
        get_parameters => "parameters",
    }
}

/// Fields of a [`Plugin`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginData {
    /// URL of this plugin
    pub url: String,
    /// ID number
    pub id: u32,
    /// Name, e.g. `pl-dircopy`
    pub name: String,
    /// Version string
    pub version: String,
    /// Container image
    pub dock_image: String,
    /// Source code repository
    pub public_repo: String,
    /// Compute resources this plugin is registered to
    pub compute_resources: String,
    /// Parameters of this plugin
    pub parameters: String,
    /// Plugin type
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    /// Instances of this plugin, where new ones are created
    pub instances: String,
}

link_set!(PluginData {
    url,
    compute_resources,
    parameters,
    instances
});

connected_model! {
    /// A plugin. Create a plugin instance to run it.
    pub struct Plugin(PluginData) {
        get_compute_resources => "compute_resources",
        get_parameters => "parameters",
        create_instance => "instances",
    }
}

macro_rules! plugin_searches {
    ($($model:ty),+) => {
        $(
            impl $model {
                /// Compute resources this plugin is registered to.
                ///
                /// # Errors
                ///
                /// Returns an error if the link cannot be resolved.
                pub fn get_compute_resources(&self) -> Result<Search<ComputeResource>> {
                    dispatch::search(
                        self,
                        route_link!($model, get_compute_resources),
                        "",
                        QueryParams::new(),
                    )
                }

                /// Parameters of this plugin.
                ///
                /// # Errors
                ///
                /// Returns an error if the link cannot be resolved.
                pub fn get_parameters(&self) -> Result<Search<PluginParameter>> {
                    let link = route_link!($model, get_parameters);
                    dispatch::search(self, link, "", QueryParams::new())
                }

                /// Write the help of each parameter of this plugin to `out`, one per line,
                /// with `name (flag)` right-aligned to 20 columns.
                ///
                /// # Errors
                ///
                /// Returns the error of a parameters request, or [`Error::Io`] if
                /// writing to `out` fails.
                pub async fn print_help<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
                    let mut parameters = self.get_parameters()?.stream();
                    while let Some(parameter) = parameters.try_next().await? {
                        let left = format!("{} ({})", parameter.name, parameter.flag);
                        write!(out, "{left:>20}: {}", parameter.help)?;
                        if let Some(default) = &parameter.default {
                            write!(out, " (default: {default})")?;
                        }
                        writeln!(out)?;
                    }
                    Ok(())
                }
            }
        )+
    };
}

plugin_searches!(PublicPlugin, Plugin);

impl Plugin {
    /// Create a plugin instance, i.e. run this plugin.
    ///
    /// `params` is an object of plugin parameters and common options such as
    /// `compute_resource_name`, `cpu_limit` or `previous_id`. `null` members are
    /// dropped. A `previous` plugin instance is required unless this is a
    /// feed synthesis (`fs`) plugin, which must not have one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `previous` does not fit the plugin
    /// type or is given twice, or the error of the request.
    pub async fn create_instance<P>(
        &self,
        previous: Option<&PluginInstance>,
        params: &P,
    ) -> Result<PluginInstance>
    where
        P: Serialize + ?Sized,
    {
        let mut body = match serde_json::to_value(params)? {
            Value::Object(body) => body,
            Value::Null => Map::new(),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "plugin instance parameters must be an object, got {other}"
                )))
            }
        };
        body.retain(|_, value| !value.is_null());

        if let Some(previous) = previous {
            if body.contains_key("previous_id") {
                return Err(Error::InvalidArgument(
                    "cannot give both previous and previous_id".to_string(),
                ));
            }
            body.insert("previous_id".to_string(), previous.id.into());
        }

        match (self.plugin_type, body.contains_key("previous_id")) {
            (PluginType::Fs, true) => Err(Error::InvalidArgument(
                "cannot create an instance of a fs-type plugin with a previous plugin instance"
                    .to_string(),
            )),
            (PluginType::Ds | PluginType::Ts, false) => Err(Error::InvalidArgument(format!(
                "plugin type is \"{}\" so previous is a required parameter",
                self.plugin_type
            ))),
            _ => {
                dispatch::post(self, route_link!(Plugin, create_instance), &Value::Object(body))
                    .await
            }
        }
    }
}

/// Fields of a [`PluginParameter`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginParameterData {
    /// URL of this parameter
    pub url: String,
    /// ID number
    pub id: u32,
    /// Name
    pub name: String,
    /// Type of its values
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Whether it may be omitted
    pub optional: bool,
    /// Default value
    #[serde(default)]
    pub default: Option<ParameterValue>,
    /// Long command-line flag
    pub flag: String,
    /// Short command-line flag
    pub short_flag: String,
    /// `store`, `store_true` or `store_false`
    pub action: String,
    /// Help text
    pub help: String,
    /// Whether user interfaces should show it
    pub ui_exposed: bool,
    /// Plugin this parameter belongs to
    pub plugin: String,
}

link_set!(PluginParameterData { url, plugin });

connected_model! {
    /// A parameter (a command-line option) of a plugin.
    pub struct PluginParameter(PluginParameterData) {
        get_plugin => "plugin",
    }
}

impl PluginParameter {
    /// The plugin this parameter belongs to.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn get_plugin(&self) -> Result<PublicPlugin> {
        dispatch::get(self, route_link!(PluginParameter, get_plugin), &QueryParams::new()).await
    }
}

/// Fields of a [`PluginInstance`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginInstanceData {
    /// URL of this plugin instance
    pub url: String,
    /// ID number
    pub id: u32,
    /// Title
    pub title: String,
    /// Name of the compute resource it runs on
    pub compute_resource_name: String,
    /// ID of its plugin
    pub plugin_id: u32,
    /// Name of its plugin
    pub plugin_name: String,
    /// Version of its plugin
    pub plugin_version: String,
    /// Type of its plugin
    pub plugin_type: PluginType,
    /// Pipeline instance it is part of
    #[serde(default)]
    pub pipeline_inst: Option<u32>,
    /// ID of its feed
    pub feed_id: u32,
    /// When it started
    pub start_date: DateTime<Utc>,
    /// When it ended, or last changed
    pub end_date: DateTime<Utc>,
    /// Path of its output directory
    pub output_path: String,
    /// Status
    pub status: Status,
    /// Summary of the job, as reported by the compute resource
    pub summary: String,
    /// Raw job information
    pub raw: String,
    /// Username of its owner
    pub owner_username: String,
    /// CPU limit, in millicores
    pub cpu_limit: i64,
    /// Memory limit, in MiB
    pub memory_limit: i64,
    /// Number of workers
    pub number_of_workers: i64,
    /// Number of GPUs
    pub gpu_limit: i64,
    /// Error code, empty when there is none
    pub error_code: String,
    /// Previous plugin instance, absent for `fs` plugins
    #[serde(default)]
    pub previous: Option<String>,
    /// Feed it belongs to
    pub feed: String,
    /// Its plugin
    pub plugin: String,
    /// Plugin instances after this one
    pub descendants: String,
    /// Output files
    pub files: String,
    /// Parameter values
    pub parameters: String,
    /// Compute resource it runs on
    pub compute_resource: String,
    /// Splits
    pub splits: String,
    /// ID of the previous plugin instance
    #[serde(default)]
    pub previous_id: Option<u32>,
    /// Size of its output, once known
    #[serde(default)]
    pub size: Option<u64>,
    /// Collection+JSON template, present when getting a single plugin instance
    #[serde(default)]
    pub template: Option<Value>,
}

link_set!(PluginInstanceData {
    url,
    previous,
    feed,
    plugin,
    descendants,
    files,
    parameters,
    compute_resource,
    splits
});

connected_model! {
    /// A plugin instance: a job running a plugin on a compute resource.
    pub struct PluginInstance(PluginInstanceData) {
        get_feed => "feed",
        get_parameters => "parameters",
        get => "url",
        set => "url",
        delete => "url",
    }
}

impl PluginInstance {
    /// The feed this plugin instance belongs to.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn get_feed(&self) -> Result<Feed> {
        dispatch::get(self, route_link!(PluginInstance, get_feed), &QueryParams::new()).await
    }

    /// Parameter values of this plugin instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be resolved.
    pub fn get_parameters(&self) -> Result<Search<PluginInstanceParameter>> {
        dispatch::search(
            self,
            route_link!(PluginInstance, get_parameters),
            "",
            QueryParams::new(),
        )
    }

    /// Get the current state of this plugin instance.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn get(&self) -> Result<PluginInstance> {
        dispatch::get(self, route_link!(PluginInstance, get), &QueryParams::new()).await
    }

    /// Change the title or status of this plugin instance.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn set(&self, title: Option<&str>, status: Option<Status>) -> Result<PluginInstance> {
        let body = json!({ "title": title, "status": status });
        dispatch::put(self, route_link!(PluginInstance, set), &body).await
    }

    /// Delete this plugin instance.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn delete(&self) -> Result<()> {
        dispatch::delete(self, route_link!(PluginInstance, delete)).await
    }

    /// Poll this plugin instance until its status is one of `statuses`, or `timeout` passed.
    ///
    /// Returns the time spent waiting and the last state seen. Check the
    /// status of the returned plugin instance to tell the two outcomes apart.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed status check.
    pub async fn wait(
        &self,
        statuses: &[Status],
        timeout: Duration,
        interval: Duration,
    ) -> Result<(Duration, PluginInstance)> {
        if statuses.contains(&self.status) {
            return Ok((Duration::ZERO, self.clone()));
        }
        let start = Instant::now();
        loop {
            let current = self.get().await?;
            let elapsed = start.elapsed();
            if statuses.contains(&current.status) || elapsed > timeout {
                return Ok((elapsed, current));
            }
            debug!(
                id = current.id,
                status = %current.status,
                elapsed_secs = elapsed.as_secs_f64(),
                "waiting for plugin instance"
            );
            sleep(interval).await;
        }
    }

    /// [`PluginInstance::wait`] for any of [`Status::FINISHED`], with the default
    /// timeout and interval.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed status check.
    pub async fn wait_until_finished(&self) -> Result<(Duration, PluginInstance)> {
        self.wait(&Status::FINISHED, DEFAULT_WAIT_TIMEOUT, DEFAULT_WAIT_INTERVAL)
            .await
    }
}

/// Fields of a [`PluginInstanceParameter`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginInstanceParameterData {
    /// URL of this parameter value
    pub url: String,
    /// ID number
    pub id: u32,
    /// Name of the parameter
    pub param_name: String,
    /// Value given
    pub value: ParameterValue,
    /// Type of the value
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Plugin instance it was given to
    pub plugin_inst: String,
    /// Plugin parameter it is a value of
    pub plugin_param: String,
}

link_set!(PluginInstanceParameterData {
    url,
    plugin_inst,
    plugin_param
});

connected_model! {
    /// A parameter value given to a plugin instance.
    pub struct PluginInstanceParameter(PluginInstanceParameterData) {
        get_plugin_instance => "plugin_inst",
        get_plugin_parameter => "plugin_param",
    }
}

impl PluginInstanceParameter {
    /// The plugin instance this value was given to.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn get_plugin_instance(&self) -> Result<PluginInstance> {
        dispatch::get(
            self,
            route_link!(PluginInstanceParameter, get_plugin_instance),
            &QueryParams::new(),
        ).await
    }

    /// The plugin parameter this is a value of.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn get_plugin_parameter(&self) -> Result<PluginParameter> {
        dispatch::get(
            self,
            route_link!(PluginInstanceParameter, get_plugin_parameter),
            &QueryParams::new(),
        ).await
    }
}

/// Fields of a [`Feed`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedData {
    /// URL of this feed
    pub url: String,
    /// ID number
    pub id: u32,
    /// When it was created
    pub creation_date: DateTime<Utc>,
    /// When it was last modified
    pub modification_date: DateTime<Utc>,
    /// Name
    pub name: String,
    /// Username of its creator
    pub creator_username: String,
    /// Number of plugin instances created
    pub created_jobs: u32,
    /// Number of plugin instances waiting
    pub waiting_jobs: u32,
    /// Number of plugin instances scheduled
    pub scheduled_jobs: u32,
    /// Number of plugin instances started
    pub started_jobs: u32,
    /// Number of plugin instances registering files
    pub registering_jobs: u32,
    /// Number of plugin instances finished successfully
    pub finished_jobs: u32,
    /// Number of plugin instances finished with an error
    pub errored_jobs: u32,
    /// Number of plugin instances cancelled
    pub cancelled_jobs: u32,
    /// URLs of its owners
    pub owner: Vec<String>,
    /// Its note
    pub note: String,
    /// Its tags
    pub tags: String,
    /// Its taggings
    pub taggings: String,
    /// Its comments
    pub comments: String,
    /// Its files
    pub files: String,
    /// Its plugin instances
    pub plugin_instances: String,
}

link_set!(FeedData {
    url,
    note,
    tags,
    taggings,
    comments,
    files,
    plugin_instances
});

connected_model! {
    /// A feed: a tree of plugin instances.
    pub struct Feed(FeedData) {
        set => "url",
        get_note => "note",
        delete => "url",
    }
}

impl Feed {
    /// Change the name or the owner of this feed.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn set(&self, name: Option<&str>, owner: Option<&str>) -> Result<Feed> {
        let body = json!({ "name": name, "owner": owner });
        dispatch::put(self, route_link!(Feed, set), &body).await
    }

    /// The note of this feed.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn get_note(&self) -> Result<FeedNote> {
        dispatch::get(self, route_link!(Feed, get_note), &QueryParams::new()).await
    }

    /// Delete this feed.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn delete(&self) -> Result<()> {
        dispatch::delete(self, route_link!(Feed, delete)).await
    }
}

/// Fields of a [`FeedNote`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedNoteData {
    /// URL of this note
    pub url: String,
    /// ID number
    pub id: u32,
    /// Title
    pub title: String,
    /// Content
    pub content: String,
    /// Feed this note belongs to
    pub feed: String,
}

link_set!(FeedNoteData { url, feed });

connected_model! {
    /// The note of a feed.
    pub struct FeedNote(FeedNoteData) {
        get_feed => "feed",
        set => "url",
    }
}

impl FeedNote {
    /// The feed this note belongs to.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn get_feed(&self) -> Result<Feed> {
        dispatch::get(self, route_link!(FeedNote, get_feed), &QueryParams::new()).await
    }

    /// Change the title or content of this note.
    ///
    /// # Errors
    ///
    /// Returns the error of the request.
    pub async fn set(&self, title: Option<&str>, content: Option<&str>) -> Result<FeedNote> {
        let body = json!({ "title": title, "content": content });
        dispatch::put(self, route_link!(FeedNote, set), &body).await
    }
}

/// Fields of a [`File`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileData {
    /// URL of this file
    pub url: String,
    /// Path in ChRIS storage
    pub fname: String,
    /// Size in bytes
    pub fsize: u64,
    /// Download URL
    pub file_resource: String,
}

link_set!(FileData { url, file_resource });

connected_model! {
    /// A file in ChRIS storage.
    pub struct File(FileData) {}
}

/// Fields of a [`PacsFile`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PacsFileData {
    /// URL of this file
    pub url: String,
    /// ID number
    pub id: u32,
    /// Path in ChRIS storage
    pub fname: String,
    /// Size in bytes
    pub fsize: u64,
    /// Download URL
    pub file_resource: String,
    /// DICOM `PatientID`
    #[serde(rename = "PatientID")]
    pub patient_id: String,
    /// DICOM `PatientName`
    #[serde(rename = "PatientName")]
    pub patient_name: String,
    /// DICOM `PatientBirthDate`
    #[serde(rename = "PatientBirthDate", default)]
    pub patient_birth_date: Option<String>,
    /// DICOM `PatientAge`, in days
    #[serde(rename = "PatientAge", default)]
    pub patient_age: Option<u32>,
    /// DICOM `PatientSex`
    #[serde(rename = "PatientSex")]
    pub patient_sex: String,
    /// DICOM `StudyDate`
    #[serde(rename = "StudyDate")]
    pub study_date: String,
    /// DICOM `AccessionNumber`
    #[serde(rename = "AccessionNumber")]
    pub accession_number: String,
    /// DICOM `Modality`
    #[serde(rename = "Modality")]
    pub modality: String,
    /// DICOM `ProtocolName`
    #[serde(rename = "ProtocolName")]
    pub protocol_name: String,
    /// DICOM `StudyInstanceUID`
    #[serde(rename = "StudyInstanceUID")]
    pub study_instance_uid: String,
    /// DICOM `StudyDescription`
    #[serde(rename = "StudyDescription")]
    pub study_description: String,
    /// DICOM `SeriesInstanceUID`
    #[serde(rename = "SeriesInstanceUID")]
    pub series_instance_uid: String,
    /// DICOM `SeriesDescription`
    #[serde(rename = "SeriesDescription")]
    pub series_description: String,
    /// PACS the file was pushed from
    pub pacs_identifier: String,
}

link_set!(PacsFileData { url, file_resource });

connected_model! {
    /// A file pushed into ChRIS from a PACS, usually a DICOM file.
    pub struct PacsFile(PacsFileData) {}
}

impl File {
    /// Directory of this file, e.g. `chris/uploads` for `chris/uploads/a.txt`.
    #[must_use]
    pub fn parent(&self) -> &str {
        parent_of(&self.fname)
    }
}

impl PacsFile {
    /// Directory of this file.
    #[must_use]
    pub fn parent(&self) -> &str {
        parent_of(&self.fname)
    }
}

fn parent_of(fname: &str) -> &str {
    fname.rsplit_once('/').map_or(fname, |(parent, _)| parent)
}
