use crate::cart::{Cart, SellerGroup};
use crate::messaging::{ConversationStore, MessagingError};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

/// The fixed set of proposable time-of-day slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingSlot {
    NineAm,
    TenAm,
    ElevenAm,
    Noon,
    OnePm,
    TwoPm,
    ThreePm,
    FourPm,
    FivePm,
}

impl MeetingSlot {
    pub const ALL: [MeetingSlot; 9] = [
        MeetingSlot::NineAm,
        MeetingSlot::TenAm,
        MeetingSlot::ElevenAm,
        MeetingSlot::Noon,
        MeetingSlot::OnePm,
        MeetingSlot::TwoPm,
        MeetingSlot::ThreePm,
        MeetingSlot::FourPm,
        MeetingSlot::FivePm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingSlot::NineAm => "9:00 AM",
            MeetingSlot::TenAm => "10:00 AM",
            MeetingSlot::ElevenAm => "11:00 AM",
            MeetingSlot::Noon => "12:00 PM",
            MeetingSlot::OnePm => "1:00 PM",
            MeetingSlot::TwoPm => "2:00 PM",
            MeetingSlot::ThreePm => "3:00 PM",
            MeetingSlot::FourPm => "4:00 PM",
            MeetingSlot::FivePm => "5:00 PM",
        }
    }
}

/// The fixed set of on-campus meetup spots offered by the map picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampusLocation {
    LeonardLibrary,
    StudentCenter,
    WellnessCenter,
    WestCampusGreen,
}

impl CampusLocation {
    pub const ALL: [CampusLocation; 4] = [
        CampusLocation::LeonardLibrary,
        CampusLocation::StudentCenter,
        CampusLocation::WellnessCenter,
        CampusLocation::WestCampusGreen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampusLocation::LeonardLibrary => "J. Paul Leonard Library",
            CampusLocation::StudentCenter => "César Chávez Student Center",
            CampusLocation::WellnessCenter => "Mashouf Wellness Center",
            CampusLocation::WestCampusGreen => "West Campus Green",
        }
    }
}

/// What the negotiation form collects; every field starts empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalDraft {
    pub date: Option<NaiveDate>,
    pub slot: Option<MeetingSlot>,
    pub location: Option<CampusLocation>,
}

/// A complete meetup suggestion for one seller. Transient: once submitted
/// it only lives on inside the formatted initial message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeetingProposal {
    pub date: NaiveDate,
    pub slot: MeetingSlot,
    pub location: CampusLocation,
}

/// A seller whose conversation was created before a later seller failed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSeller {
    pub seller_id: i64,
    pub seller_name: String,
    pub conversation_id: i64,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("no cart items are selected for checkout")]
    NothingSelected,
    #[error("checkout is not at the step this action expects")]
    WrongState,
    #[error("meeting date, time and location must all be set")]
    IncompleteProposal,
    #[error("meeting date cannot be in the past")]
    DateInPast,
    #[error(
        "checkout stopped after {} seller(s): contacting {failed_seller_name} failed",
        .completed.len()
    )]
    Partial {
        completed: Vec<CompletedSeller>,
        failed_seller_id: i64,
        failed_seller_name: String,
        #[source]
        source: MessagingError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutState {
    GroupingItems,
    NegotiatingSeller(usize),
    Submitting,
    Completed(Vec<i64>),
    Failed,
}

/// Formats the fixed proposal template sent as the first message of each
/// per-seller conversation.
pub fn format_initial_message(group: &SellerGroup, proposal: &MeetingProposal) -> String {
    let items = group
        .items
        .iter()
        .map(|item| format!("{} (${})", item.name, item.price))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Hi! I'd like to purchase: {items}. I'm suggesting we meet at {} on {} at {}. Does this work for you?",
        proposal.location.as_str(),
        proposal.date.format("%Y-%m-%d"),
        proposal.slot.as_str()
    )
}

/// Drives a multi-seller checkout: partitions the selected cart items into
/// per-seller groups, collects one meeting proposal per seller, then
/// creates one conversation per seller in order. Creation is not atomic
/// across sellers; on a partial failure the flow stops and reports which
/// sellers were already contacted (fail-stop, never fail-continue).
pub struct CheckoutOrchestrator {
    cart: Arc<Cart>,
    conversations: Arc<ConversationStore>,
    groups: Vec<SellerGroup>,
    proposals: Vec<MeetingProposal>,
    state: CheckoutState,
    override_today: Option<NaiveDate>,
}

impl CheckoutOrchestrator {
    pub fn new(cart: Arc<Cart>, conversations: Arc<ConversationStore>) -> Self {
        Self {
            cart,
            conversations,
            groups: Vec::new(),
            proposals: Vec::new(),
            state: CheckoutState::GroupingItems,
            override_today: None,
        }
    }

    /// Overrides "today" for date validation, for testing or manual
    /// specification.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.override_today = Some(today);
        self
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn seller_groups(&self) -> &[SellerGroup] {
        &self.groups
    }

    /// The group currently being negotiated, if any.
    pub fn current_seller(&self) -> Option<&SellerGroup> {
        match self.state {
            CheckoutState::NegotiatingSeller(k) => self.groups.get(k),
            _ => None,
        }
    }

    /// Snapshots the seller groups and enters negotiation. With nothing
    /// selected the flow never starts; the caller sends the user back to
    /// the cart.
    pub fn begin(&mut self) -> Result<(), CheckoutError> {
        if self.state != CheckoutState::GroupingItems {
            return Err(CheckoutError::WrongState);
        }
        let groups = self.cart.seller_groups();
        if groups.is_empty() {
            return Err(CheckoutError::NothingSelected);
        }
        info!(target: "Checkout", "Starting checkout with {} seller group(s)", groups.len());
        self.groups = groups;
        self.proposals.clear();
        self.state = CheckoutState::NegotiatingSeller(0);
        Ok(())
    }

    /// Accepts the proposal for the current seller and advances. The
    /// draft must be complete and the date must not be in the past.
    pub fn submit_proposal(&mut self, draft: ProposalDraft) -> Result<(), CheckoutError> {
        let CheckoutState::NegotiatingSeller(k) = self.state else {
            return Err(CheckoutError::WrongState);
        };

        let (Some(date), Some(slot), Some(location)) = (draft.date, draft.slot, draft.location)
        else {
            return Err(CheckoutError::IncompleteProposal);
        };
        if date < self.today() {
            return Err(CheckoutError::DateInPast);
        }

        self.proposals.push(MeetingProposal {
            date,
            slot,
            location,
        });
        self.state = if k + 1 < self.groups.len() {
            CheckoutState::NegotiatingSeller(k + 1)
        } else {
            CheckoutState::Submitting
        };
        Ok(())
    }

    /// Abandons the flow during negotiation. No conversations exist yet
    /// and the cart is untouched.
    pub fn cancel(&mut self) -> Result<(), CheckoutError> {
        match self.state {
            CheckoutState::NegotiatingSeller(_) => {
                self.groups.clear();
                self.proposals.clear();
                self.state = CheckoutState::GroupingItems;
                Ok(())
            }
            _ => Err(CheckoutError::WrongState),
        }
    }

    /// Creates one conversation per seller, in group order, removing each
    /// group's cart entries as soon as its conversation exists. The first
    /// failure stops the flow: earlier sellers stay contacted and their
    /// items stay removed, the failing seller's items stay in the cart.
    pub async fn submit(&mut self) -> Result<Vec<i64>, CheckoutError> {
        if self.state != CheckoutState::Submitting {
            return Err(CheckoutError::WrongState);
        }

        let mut completed: Vec<CompletedSeller> = Vec::new();
        for (group, proposal) in self.groups.iter().zip(&self.proposals) {
            let message = format_initial_message(group, proposal);
            let subject = format!("Purchase of {} item(s)", group.items.len());
            // The first item anchors the conversation to a product.
            let anchor = &group.items[0];

            let conversation_id = match self
                .conversations
                .create_conversation(anchor.product_id, group.seller_id, &subject, &message)
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    warn!(
                        target: "Checkout",
                        "Contacting seller {} failed after {} completed group(s): {e}",
                        group.seller_id,
                        completed.len()
                    );
                    self.state = CheckoutState::Failed;
                    return Err(CheckoutError::Partial {
                        completed,
                        failed_seller_id: group.seller_id,
                        failed_seller_name: group.seller_name.clone(),
                        source: e,
                    });
                }
            };

            let cart_ids: Vec<String> =
                group.items.iter().map(|item| item.cart_id.clone()).collect();
            self.cart.remove_many(&cart_ids);
            completed.push(CompletedSeller {
                seller_id: group.seller_id,
                seller_name: group.seller_name.clone(),
                conversation_id,
            });
        }

        let conversation_ids: Vec<i64> =
            completed.iter().map(|c| c.conversation_id).collect();
        info!(
            target: "Checkout",
            "Checkout completed: {} conversation(s) created",
            conversation_ids.len()
        );
        self.state = CheckoutState::Completed(conversation_ids.clone());
        Ok(conversation_ids)
    }

    fn today(&self) -> NaiveDate {
        self.override_today
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}
