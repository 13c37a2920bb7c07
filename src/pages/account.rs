use std::path::PathBuf;

use super::{FormState, Loadable, Redirect};
use crate::envelope::Envelope;
use crate::errors::ValidationError;
use crate::nav::Route;
use crate::structs::client::Client;
use crate::structs::{
    Contribution, ContributionForm, ContributionQuery, LookupItem, LookupRef, NoteUpload,
    ObjectId, ProfileUpdate, UserInfo, VideoUpload,
};
use crate::validation;

fn lookup_id(lookup: &Option<LookupRef>) -> String {
    lookup
        .as_ref()
        .map(|lookup| lookup.id().to_string())
        .unwrap_or_default()
}

/// Profile page with the university/department/subject pickers.
#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub info: Loadable<UserInfo>,
    pub universities: Vec<LookupItem>,
    pub departments: Vec<LookupItem>,
    pub major_subjects: Vec<LookupItem>,
    pub form: ProfileUpdate,
    pub state: FormState,
}

impl ProfilePage {
    pub fn load(client: &Client) -> Self {
        let info = match client.user_info().into_result() {
            Ok(Some(info)) => Loadable::Loaded(info),
            Ok(None) => Loadable::Empty,
            Err(message) => Loadable::Failed(message.display()),
        };

        let form = info.loaded().map(Self::form_for).unwrap_or_default();

        // Pickers stay empty if a lookup fails; the form still works
        let options = |envelope: Envelope<Vec<LookupItem>>| {
            envelope.into_result().ok().flatten().unwrap_or_default()
        };

        Self {
            info,
            universities: options(client.universities()),
            departments: options(client.departments()),
            major_subjects: options(client.major_subjects()),
            form,
            state: FormState::Idle,
        }
    }

    fn form_for(info: &UserInfo) -> ProfileUpdate {
        ProfileUpdate {
            phone_number: info.phone_number.clone().unwrap_or_default(),
            date_of_birth: info.date_of_birth.clone().unwrap_or_default(),
            university: lookup_id(&info.university),
            department: lookup_id(&info.department),
            major_subject: lookup_id(&info.major_subject),
            profile_picture: None,
        }
    }

    pub fn choose_picture(&mut self, path: impl Into<PathBuf>) {
        self.form.profile_picture = Some(path.into());
    }

    pub fn submit(&mut self, client: &Client) -> &FormState {
        self.state = FormState::Submitting;
        let envelope = client.update_user_info(&self.form);

        self.state = FormState::from_envelope(&envelope, "Profile updated successfully", None);
        if let Some(info) = envelope.data {
            self.form = Self::form_for(&info);
            self.info = Loadable::Loaded(info);
        }
        &self.state
    }
}

/// The logged-in user's own contributions.
#[derive(Debug, Clone)]
pub struct MyContributionsPage {
    pub contributions: Loadable<Vec<Contribution>>,
    pub state: FormState,
}

impl MyContributionsPage {
    pub fn load(client: &Client) -> Self {
        Self {
            contributions: Loadable::from_list(
                client.list_user_contributions(&ContributionQuery::default()),
            ),
            state: FormState::Idle,
        }
    }

    /// Deletes on the backend, then drops the row without refetching.
    pub fn delete(&mut self, client: &Client, id: &ObjectId) -> &FormState {
        self.state = FormState::Submitting;
        let envelope = client.delete_contribution(id);
        self.state = FormState::from_envelope(&envelope, "Contribution deleted successfully", None);

        if envelope.status {
            if let Loadable::Loaded(list) = &mut self.contributions {
                list.retain(|contribution| &contribution.id != id);
            }
            if matches!(&self.contributions, Loadable::Loaded(list) if list.is_empty()) {
                self.contributions = Loadable::Empty;
            }
        }
        &self.state
    }

    pub fn edit_route(id: &ObjectId) -> Route {
        Route::UpdateContribution(id.clone())
    }
}

/// Add/update contribution form.
#[derive(Debug, Clone, Default)]
pub struct ContributionEditor {
    /// Set when editing an existing contribution.
    pub editing: Option<ObjectId>,
    pub form: ContributionForm,
    pub state: FormState,
}

impl ContributionEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an existing contribution into the form. Files are not
    /// downloaded; existing videos and notes are kept by id.
    pub fn for_update(client: &Client, id: &ObjectId) -> Result<Self, String> {
        let contribution = match client.get_contribution(id).into_result() {
            Ok(Some(contribution)) => contribution,
            Ok(None) => return Err("Contribution not found".to_string()),
            Err(message) => return Err(message.display()),
        };

        let form = ContributionForm {
            title: contribution.title,
            description: contribution.description,
            price: format!("{:.2}", contribution.price),
            related_university: lookup_id(&contribution.related_university),
            related_department: lookup_id(&contribution.related_department),
            related_major_subject: lookup_id(&contribution.related_major_subject),
            thumbnail_image: None,
            tags: contribution.tags.into_iter().map(|tag| tag.name).collect(),
            videos: contribution
                .videos
                .into_iter()
                .map(|video| VideoUpload {
                    id: video.id,
                    title: video.title,
                    file: None,
                })
                .collect(),
            notes: contribution
                .notes
                .into_iter()
                .map(|note| NoteUpload {
                    id: note.id,
                    file: None,
                })
                .collect(),
        };

        Ok(Self {
            editing: Some(contribution.id),
            form,
            state: FormState::Idle,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::require("title", &self.form.title)?;
        validation::require("description", &self.form.description)?;
        validation::price(&self.form.price).map(|_| ())
    }

    pub fn submit(&mut self, client: &Client) -> &FormState {
        if let Err(err) = self.validate() {
            self.state = FormState::Error(err.to_string());
            return &self.state;
        }

        self.state = FormState::Submitting;
        let (envelope, success) = match &self.editing {
            Some(id) => (
                client.update_contribution(id, &self.form),
                "Contribution updated successfully",
            ),
            None => (
                client.create_contribution(&self.form),
                "Contribution created successfully",
            ),
        };

        let redirect = Redirect::route(Route::MyContributions, client.options().redirect_delay);
        self.state = FormState::from_envelope(&envelope, success, Some(redirect));
        &self.state
    }
}
