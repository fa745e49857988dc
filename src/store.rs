//! In-memory storage for photo jobs and contact submissions
//!
//! Records live for the lifetime of the process. The [`Storage`] trait is
//! the seam a persistent backend would plug into; handlers and the
//! enhancement workflow only ever see `Arc<dyn Storage>`.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::models::{Contact, NewContact, NewPhoto, Photo, PhotoStatus, PhotoUpdate};

/// Storage contract for photo jobs and contact submissions.
///
/// Operations are plain map lookups, so they are synchronous; callers in
/// async context never hold a guard across an await point because guards
/// never escape the implementation.
pub trait Storage: Send + Sync {
    /// Insert a photo record, assigning the next id.
    fn create_photo(&self, new: NewPhoto) -> Photo;

    /// Fetch a photo by id.
    fn photo(&self, id: i64) -> Option<Photo>;

    /// Merge `update` onto an existing record under one write lock.
    /// Returns the updated record, or `None` for an unknown id.
    fn update_photo(&self, id: i64, update: PhotoUpdate) -> Option<Photo>;

    /// Insert a contact form submission, assigning the next id.
    fn create_contact(&self, new: NewContact) -> Contact;
}

#[derive(Default)]
struct Inner {
    photos: HashMap<i64, Photo>,
    contacts: HashMap<i64, Contact>,
    last_photo_id: i64,
    last_contact_id: i64,
}

/// Hash-map storage guarded by a single `RwLock`.
///
/// One lock over both maps keeps id assignment and read-modify-write
/// updates atomic without ordering concerns between locks.
#[derive(Default)]
pub struct MemStorage {
    inner: RwLock<Inner>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn create_photo(&self, new: NewPhoto) -> Photo {
        let mut inner = self.inner.write();
        inner.last_photo_id += 1;
        let photo = Photo {
            id: inner.last_photo_id,
            original_url: new.original_url,
            enhanced_url: new.enhanced_url,
            status: new.status.unwrap_or(PhotoStatus::Processing),
            created_at: Utc::now(),
        };
        inner.photos.insert(photo.id, photo.clone());
        photo
    }

    fn photo(&self, id: i64) -> Option<Photo> {
        self.inner.read().photos.get(&id).cloned()
    }

    fn update_photo(&self, id: i64, update: PhotoUpdate) -> Option<Photo> {
        let mut inner = self.inner.write();
        let photo = inner.photos.get_mut(&id)?;
        if let Some(enhanced_url) = update.enhanced_url {
            photo.enhanced_url = Some(enhanced_url);
        }
        if let Some(status) = update.status {
            photo.status = status;
        }
        Some(photo.clone())
    }

    fn create_contact(&self, new: NewContact) -> Contact {
        let mut inner = self.inner.write();
        inner.last_contact_id += 1;
        let contact = Contact {
            id: inner.last_contact_id,
            name: new.name,
            email: new.email,
            subject: new.subject,
            message: new.message,
            created_at: Utc::now(),
        };
        inner.contacts.insert(contact.id, contact.clone());
        contact
    }
}
