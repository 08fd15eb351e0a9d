//! An editor together with the collaborators it needs: the image list, the
//! class list, the save directory and change listeners.

use std::path::{Path, PathBuf};

use kurbo::Size;
use walkdir::WalkDir;

use super::event::{BoxesChanged, EditOutcome, HostRequest, InputEvent};
use super::{Editor, EditorConfig};
use crate::codec::{self, LabelFormat};
use crate::error::BoxlabError;
use crate::model::{ClassIndex, ClassList, ImageSize, LabeledBox};

/// Image file extensions the session opens, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Ordered image paths with a cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageList {
    paths: Vec<PathBuf>,
    cursor: Option<usize>,
}

impl ImageList {
    /// The cursor starts on the first path, if any.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let cursor = (!paths.is_empty()).then_some(0);
        Self { paths, cursor }
    }

    /// Supported images directly inside `dir`, sorted by file name.
    pub fn open_dir(dir: &Path) -> Result<Self, BoxlabError> {
        if !dir.is_dir() {
            return Err(BoxlabError::InvalidInput(format!(
                "'{}' is not a directory",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|source| {
                BoxlabError::InvalidInput(format!(
                    "failed to list '{}': {source}",
                    dir.display()
                ))
            })?;
            if entry.file_type().is_file() && is_supported_image(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort_by_cached_key(|path| file_name_of(path));

        if paths.is_empty() {
            return Err(BoxlabError::InvalidInput(format!(
                "no images found in '{}'",
                dir.display()
            )));
        }
        Ok(Self::new(paths))
    }

    /// Existing, supported files from `files`, sorted by lowercase file name.
    pub fn open_files<I, P>(files: I) -> Result<Self, BoxlabError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut paths: Vec<PathBuf> = files
            .into_iter()
            .map(Into::into)
            .filter(|path| path.is_file() && is_supported_image(path))
            .collect();
        paths.sort_by_cached_key(|path| file_name_of(path).to_lowercase());

        if paths.is_empty() {
            return Err(BoxlabError::InvalidInput(
                "none of the given files is a supported image".to_string(),
            ));
        }
        Ok(Self::new(paths))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Path> {
        self.cursor
            .and_then(|index| self.paths.get(index))
            .map(PathBuf::as_path)
    }

    /// Moves the cursor, clamped to the list. Returns the new current path.
    pub fn seek(&mut self, index: usize) -> Option<&Path> {
        if self.paths.is_empty() {
            return None;
        }
        self.cursor = Some(index.min(self.paths.len() - 1));
        self.current()
    }

    /// Steps forward; `None` at the end of the list.
    pub fn advance(&mut self) -> Option<&Path> {
        let next = self.cursor? + 1;
        if next >= self.paths.len() {
            return None;
        }
        self.cursor = Some(next);
        self.current()
    }

    /// Steps back; `None` at the start of the list.
    pub fn retreat(&mut self) -> Option<&Path> {
        let previous = self.cursor?.checked_sub(1)?;
        self.cursor = Some(previous);
        self.current()
    }
}

struct LoadedImage {
    path: PathBuf,
    stem: String,
    size: ImageSize,
}

type Listener = Box<dyn FnMut(&BoxesChanged)>;

/// A single-threaded editing session over a list of images.
///
/// Every committed change (create, move, resize, delete, clear, save and
/// image load) is announced to subscribers as a [`BoxesChanged`].
pub struct Session {
    editor: Editor,
    images: ImageList,
    classes: ClassList,
    format: LabelFormat,
    save_dir: Option<PathBuf>,
    viewport: Option<Size>,
    current: Option<LoadedImage>,
    listeners: Vec<Listener>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Session {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            editor: Editor::new(config),
            images: ImageList::default(),
            classes: ClassList::default(),
            format: LabelFormat::default(),
            save_dir: None,
            viewport: None,
            current: None,
            listeners: Vec::new(),
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn boxes(&self) -> &[LabeledBox] {
        self.editor.store().all()
    }

    pub fn images(&self) -> &ImageList {
        &self.images
    }

    pub fn current_image(&self) -> Option<&Path> {
        self.current.as_ref().map(|loaded| loaded.path.as_path())
    }

    pub fn current_stem(&self) -> Option<&str> {
        self.current.as_ref().map(|loaded| loaded.stem.as_str())
    }

    pub fn classes(&self) -> &ClassList {
        &self.classes
    }

    pub fn set_classes(&mut self, classes: ClassList) {
        self.classes = classes;
    }

    pub fn load_classes(&mut self, path: &Path) -> Result<(), BoxlabError> {
        self.classes = ClassList::load(path)?;
        log::info!("loaded {} class names from {}", self.classes.len(), path.display());
        Ok(())
    }

    /// Sets the class for new boxes, clamped into the class list.
    pub fn set_active_class(&mut self, index: i32) -> ClassIndex {
        let upper = i32::try_from(self.classes.len()).unwrap_or(i32::MAX) - 1;
        let class = ClassIndex::new(index.clamp(0, upper.max(0)));
        self.editor.set_active_class(class);
        class
    }

    /// Sets the class for new boxes by name; unknown names select
    /// [`ClassIndex::UNLABELED`].
    pub fn set_active_class_by_name(&mut self, name: &str) -> ClassIndex {
        let class = self
            .classes
            .index_of(name.trim())
            .unwrap_or(ClassIndex::UNLABELED);
        self.editor.set_active_class(class);
        class
    }

    pub fn format(&self) -> LabelFormat {
        self.format
    }

    pub fn set_format(&mut self, format: LabelFormat) {
        self.format = format;
    }

    pub fn save_dir(&self) -> Option<&Path> {
        self.save_dir.as_deref()
    }

    /// `None` saves next to the image under `labels_yolo/train` or
    /// `labels_voc/train`.
    pub fn set_save_dir(&mut self, dir: Option<PathBuf>) {
        self.save_dir = dir.filter(|dir| !dir.as_os_str().is_empty());
    }

    /// Viewport that freshly loaded images are fitted into.
    pub fn set_viewport(&mut self, viewport: Option<Size>) {
        self.viewport = viewport;
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&BoxesChanged) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Replaces the image list and loads its current image.
    pub fn set_images(&mut self, mut images: ImageList, start: usize) -> Result<(), BoxlabError> {
        let first = images.seek(start).map(Path::to_path_buf);
        match first {
            Some(path) => {
                self.load_image(&path)?;
                self.images = images;
                Ok(())
            }
            None => {
                self.images = images;
                self.current = None;
                self.editor.unload_image();
                self.notify();
                Ok(())
            }
        }
    }

    pub fn open_dir(&mut self, dir: &Path) -> Result<usize, BoxlabError> {
        let images = ImageList::open_dir(dir)?;
        let count = images.len();
        self.set_images(images, 0)?;
        Ok(count)
    }

    pub fn open_files<I, P>(&mut self, files: I) -> Result<usize, BoxlabError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let images = ImageList::open_files(files)?;
        let count = images.len();
        self.set_images(images, 0)?;
        Ok(count)
    }

    /// Makes `path` the active image with an empty box list.
    ///
    /// On failure the previous image and its boxes are kept.
    pub fn load_image(&mut self, path: &Path) -> Result<(), BoxlabError> {
        let size = ImageSize::from_file(path)?;
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BoxlabError::InvalidInput(format!("'{}' has no file name", path.display()))
            })?;

        self.editor.load_image(size);
        if let Some(viewport) = self.viewport {
            self.editor
                .space_mut()
                .fit(Size::new(size.width as f64, size.height as f64), viewport);
        }
        self.current = Some(LoadedImage {
            path: path.to_path_buf(),
            stem,
            size,
        });
        log::debug!("loaded {} ({size})", path.display());
        self.notify();
        Ok(())
    }

    /// Loads the next image. Returns false at the end of the list.
    pub fn next_image(&mut self) -> Result<bool, BoxlabError> {
        let mut images = self.images.clone();
        let next = images.advance().map(Path::to_path_buf);
        self.step_to(images, next)
    }

    /// Loads the previous image. Returns false at the start of the list.
    pub fn previous_image(&mut self) -> Result<bool, BoxlabError> {
        let mut images = self.images.clone();
        let previous = images.retreat().map(Path::to_path_buf);
        self.step_to(images, previous)
    }

    fn step_to(&mut self, images: ImageList, path: Option<PathBuf>) -> Result<bool, BoxlabError> {
        match path {
            Some(path) => {
                self.load_image(&path)?;
                self.images = images;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Feeds one event to the editor and carries out whatever it asks for.
    pub fn handle(&mut self, event: &InputEvent) -> Result<EditOutcome, BoxlabError> {
        let outcome = self.editor.handle(event);
        if outcome.changed {
            self.notify();
        }

        match outcome.request {
            Some(HostRequest::NextImage) => {
                self.next_image()?;
            }
            Some(HostRequest::PreviousImage) => {
                self.previous_image()?;
            }
            Some(HostRequest::Save) => {
                self.save_current()?;
            }
            None => {}
        }
        Ok(outcome)
    }

    /// Removes every box of the current image.
    pub fn clear_boxes(&mut self) {
        self.editor.clear();
        self.notify();
    }

    /// Directory the next save will write to, if an image is loaded.
    pub fn resolved_save_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.save_dir {
            return Some(dir.clone());
        }
        let image_dir = self.current.as_ref()?.path.parent()?;
        Some(image_dir.join(self.format.default_subdir()))
    }

    /// Writes the full box list of the current image.
    ///
    /// Boxes stay in place after saving.
    pub fn save_current(&mut self) -> Result<PathBuf, BoxlabError> {
        let loaded = self
            .current
            .as_ref()
            .ok_or_else(|| BoxlabError::InvalidInput("no image loaded".to_string()))?;
        let dir = self
            .resolved_save_dir()
            .ok_or_else(|| BoxlabError::InvalidInput("no save directory".to_string()))?;

        let path = codec::write_labels(
            &dir,
            &loaded.stem,
            self.format,
            self.editor.store().all(),
            loaded.size,
            &self.classes,
        )
        .inspect_err(|err| log::warn!("save failed: {err}"))?;

        log::info!(
            "saved {} box(es) as {} to {}",
            self.boxes().len(),
            self.format,
            path.display()
        );
        self.notify();
        Ok(path)
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let change = BoxesChanged {
            stem: self.current_stem().unwrap_or_default().to_string(),
            boxes: self.boxes().to_vec(),
        };
        for listener in &mut self.listeners {
            listener(&change);
        }
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
