use std::collections::HashSet;

use super::{log_storage_failure, FormState, Loadable, Redirect};
use crate::catalog::{self, ContributorStats, SortOrder, ALL_TAGS};
use crate::nav::Route;
use crate::payment::{PaymentOutcome, PaymentReturn};
use crate::structs::client::Client;
use crate::structs::{Contribution, ContributionQuery, ObjectId, Rating, RatingInput};
use crate::validation;

/// Public contribution listing with tag, search and sort controls.
#[derive(Debug, Clone)]
pub struct BrowsePage {
    pub contributions: Loadable<Vec<Contribution>>,
    pub active_tag: String,
    pub search: String,
    pub sort: Option<SortOrder>,
}

impl BrowsePage {
    pub fn load(client: &Client, query: &ContributionQuery) -> Self {
        Self {
            contributions: Loadable::from_list(client.list_all_contributions(query)),
            active_tag: ALL_TAGS.to_string(),
            search: String::new(),
            sort: None,
        }
    }

    /// What the list shows after the local filters.
    pub fn visible(&self) -> Vec<&Contribution> {
        let Some(all) = self.contributions.loaded() else {
            return Vec::new();
        };

        let matching: HashSet<&ObjectId> = catalog::search(all, &self.search)
            .into_iter()
            .map(|contribution| &contribution.id)
            .collect();

        let mut visible: Vec<&Contribution> = catalog::filter_by_tag(all, &self.active_tag)
            .into_iter()
            .filter(|contribution| matching.contains(&contribution.id))
            .collect();

        if let Some(order) = self.sort {
            catalog::sort_by(&mut visible, order);
        }
        visible
    }
}

pub fn contributors(client: &Client) -> Loadable<Vec<ContributorStats>> {
    match Loadable::from_list(client.list_all_contributions(&ContributionQuery::default())) {
        Loadable::Loaded(list) => Loadable::Loaded(catalog::contributor_leaderboard(&list)),
        Loadable::Empty => Loadable::Empty,
        Loadable::Failed(message) => Loadable::Failed(message),
        Loadable::Loading => Loadable::Loading,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollOutcome {
    /// Anonymous users go log in first and come back here.
    LoginRequired(Redirect),
    /// Paid contribution: full-page redirect to the payment processor.
    Payment(Redirect),
    Enrolled,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ContributionDetailPage {
    pub id: ObjectId,
    pub contribution: Loadable<Contribution>,
    pub enrolled: bool,
    pub ratings: Loadable<Vec<Rating>>,
}

impl ContributionDetailPage {
    pub fn load(client: &Client, id: &ObjectId) -> Self {
        log_storage_failure(
            client,
            "remember the viewed contribution",
            client.session().remember_contribution(id),
        );

        let contribution = match client.get_contribution(id).into_result() {
            Ok(Some(contribution)) => Loadable::Loaded(contribution),
            Ok(None) => Loadable::Empty,
            Err(message) => Loadable::Failed(message.display()),
        };

        let mut enrolled = contribution
            .loaded()
            .and_then(|contribution| contribution.is_enrolled)
            .unwrap_or(false);

        if !enrolled && client.is_logged_in() {
            if let Ok(Some(enrollments)) = client.list_enrollments().into_result() {
                enrolled = catalog::enrolled_ids(&enrollments).contains(id);
            }
        }

        Self {
            id: id.clone(),
            contribution,
            enrolled,
            ratings: Loadable::from_list(client.list_ratings(id)),
        }
    }

    pub fn enroll(&mut self, client: &Client) -> EnrollOutcome {
        if !client.is_logged_in() {
            return EnrollOutcome::LoginRequired(Redirect::now(Route::Login));
        }

        let envelope = client.create_enrollment(&self.id);
        if !envelope.status {
            return EnrollOutcome::Failed(envelope.message.display());
        }

        match envelope.data.and_then(|checkout| checkout.payment_url) {
            Some(url) => EnrollOutcome::Payment(Redirect::external(url)),
            None => {
                self.enrolled = true;
                EnrollOutcome::Enrolled
            }
        }
    }

    /// Route for the login page to send the user back to.
    pub fn return_route(&self) -> Route {
        Route::ContributionDetail(self.id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct RatingForm {
    pub rating: u8,
    pub comment: String,
    pub state: FormState,
}

impl Default for RatingForm {
    fn default() -> Self {
        Self {
            rating: 5,
            comment: String::new(),
            state: FormState::Idle,
        }
    }
}

impl RatingForm {
    pub fn submit(&mut self, client: &Client, contribution_id: &ObjectId) -> &FormState {
        if let Err(err) = validation::rating(self.rating) {
            self.state = FormState::Error(err.to_string());
            return &self.state;
        }

        self.state = FormState::Submitting;
        let comment = self.comment.trim();
        let envelope = client.submit_rating(
            contribution_id,
            &RatingInput {
                rating: self.rating,
                comment: (!comment.is_empty()).then(|| comment.to_string()),
            },
        );

        self.state = FormState::from_envelope(&envelope, "Thanks for your rating!", None);
        if self.state.is_success() {
            self.comment.clear();
        }
        &self.state
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentState {
    Succeeded {
        contribution_id: Option<ObjectId>,
        redirect_url: Option<String>,
    },
    /// The processor said yes but verification did not confirm it.
    Unverified(String),
    Failed,
    Cancelled,
}

/// Landing page for the payment processor's return redirect.
#[derive(Debug, Clone)]
pub struct PaymentReturnPage {
    pub ret: PaymentReturn,
    state: Option<PaymentState>,
}

impl PaymentReturnPage {
    pub fn open(location: &str) -> Option<Self> {
        PaymentReturn::parse(location).map(|ret| Self { ret, state: None })
    }

    /// Settles the page, verifying the transaction at most once.
    pub fn resolve(&mut self, client: &Client) -> &PaymentState {
        let ret = &self.ret;
        self.state.get_or_insert_with(|| match ret.outcome {
            PaymentOutcome::Fail => PaymentState::Failed,
            PaymentOutcome::Cancel => PaymentState::Cancelled,
            PaymentOutcome::Success if !ret.needs_verification() => PaymentState::Succeeded {
                contribution_id: client.session().last_viewed_contribution(),
                redirect_url: None,
            },
            PaymentOutcome::Success => {
                let envelope = client.verify_payment(ret.val_id.as_deref(), ret.tran_id.as_deref());
                if envelope.status {
                    let verified = envelope.data.unwrap_or_default();
                    PaymentState::Succeeded {
                        contribution_id: verified
                            .contribution_id
                            .or_else(|| client.session().last_viewed_contribution()),
                        redirect_url: verified.redirect_url,
                    }
                } else {
                    PaymentState::Unverified(envelope.message.display())
                }
            }
        })
    }

    /// Where the "continue" button goes once resolved.
    pub fn continue_to(&self) -> Redirect {
        match &self.state {
            Some(PaymentState::Succeeded {
                redirect_url: Some(url),
                ..
            }) => Redirect::external(url.clone()),
            Some(PaymentState::Succeeded {
                contribution_id: Some(id),
                ..
            }) => Redirect::now(Route::ContributionView(id.clone())),
            Some(PaymentState::Failed) | Some(PaymentState::Cancelled) => {
                Redirect::now(Route::Contributions)
            }
            _ => Redirect::now(Route::Home),
        }
    }
}
