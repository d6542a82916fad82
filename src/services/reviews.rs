use chrono::Utc;
use sea_orm::{
    sea_query::Expr,
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::{car, review};
use crate::error::{AppError, AppResult};
use crate::policy::{authorize, Action, Actor};
use crate::utils::geo::round_to;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 50;
const MAX_PAGE: u64 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarReviews {
    pub reviews: Vec<review::Model>,
    /// Over all of the car's reviews, not just this page.
    pub average_rating: Option<f64>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

/// Review a completed car rental. Ratings outside 1..=5 are clamped.
pub async fn create_review<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    request: NewReview,
) -> AppResult<review::Model> {
    let booking = booking::Entity::find_by_id(request.booking_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    authorize(Action::ReviewBooking, actor, Some(booking.user_id))?;

    let car_id = booking
        .car_id
        .ok_or_else(|| AppError::BadRequest("Only car rentals can be reviewed".to_string()))?;

    if booking.status != BookingStatus::Completed {
        return Err(AppError::BadRequest(
            "Only completed bookings can be reviewed".to_string(),
        ));
    }

    let existing = review::Entity::find()
        .filter(review::Column::BookingId.eq(booking.id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Booking has already been reviewed".to_string()));
    }

    let review = review::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        user_id: Set(actor.id),
        car_id: Set(car_id),
        rating: Set(request.rating.clamp(1, 5)),
        comment: Set(request
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(review_id = %review.id, car_id = %car_id, rating = review.rating, "Review created");
    Ok(review)
}

pub async fn list_car_reviews<C: ConnectionTrait>(
    db: &C,
    car_id: Uuid,
    query: ReviewQuery,
) -> AppResult<CarReviews> {
    car::Entity::find_by_id(car_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;

    let page = query.page.unwrap_or(1).max(1);
    if page > MAX_PAGE {
        return Err(AppError::BadRequest(format!("Page must be at most {}", MAX_PAGE)));
    }
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let paginator = review::Entity::find()
        .filter(review::Column::CarId.eq(car_id))
        .order_by_desc(review::Column::CreatedAt)
        .paginate(db, page_size);

    let total = paginator.num_items().await?;
    let reviews = paginator.fetch_page(page - 1).await?;

    let rating_sum: Option<i64> = review::Entity::find()
        .select_only()
        .column_as(Expr::col(review::Column::Rating).sum(), "rating_sum")
        .filter(review::Column::CarId.eq(car_id))
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten();

    let average_rating = rating_sum
        .filter(|_| total > 0)
        .map(|sum| round_to(sum as f64 / total as f64, 1));

    Ok(CarReviews {
        reviews,
        average_rating,
        total,
        page,
        page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::DatabaseConnection;

    use crate::entities::user::UserRole;
    use crate::test_support::{self, actor};

    async fn completed_rental(
        db: &DatabaseConnection,
        car_id: Uuid,
        renter_id: Uuid,
        status: BookingStatus,
    ) -> booking::Model {
        let start = Utc::now() - Duration::days(3);
        booking::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(renter_id),
            car_id: Set(Some(car_id)),
            carpool_id: Set(None),
            start_date: Set(start.into()),
            end_date: Set(Some((start + Duration::days(1)).into())),
            total_price: Set(1000.0),
            status: Set(status),
            created_at: Set(start.into()),
        }
        .insert(db)
        .await
        .unwrap()
    }

    fn review_of(booking_id: Uuid, rating: i32) -> NewReview {
        NewReview {
            booking_id,
            rating,
            comment: Some("  Smooth ride  ".to_string()),
        }
    }

    #[tokio::test]
    async fn ratings_are_clamped_and_reviews_are_unique() {
        let db = test_support::setup_db().await;
        let owner = test_support::create_user(&db, UserRole::Driver, true).await;
        let renter = test_support::create_user(&db, UserRole::Passenger, true).await;
        let car = test_support::create_car(&db, owner.id, 1000.0, None).await;
        let booking = completed_rental(&db, car.id, renter.id, BookingStatus::Completed).await;

        let review = create_review(&db, &actor(&renter), review_of(booking.id, 9))
            .await
            .unwrap();
        assert_eq!(review.rating, 5);
        assert_eq!(review.comment.as_deref(), Some("Smooth ride"));
        assert_eq!(review.car_id, car.id);

        let err = create_review(&db, &actor(&renter), review_of(booking.id, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_the_renter_reviews_a_completed_rental() {
        let db = test_support::setup_db().await;
        let owner = test_support::create_user(&db, UserRole::Driver, true).await;
        let renter = test_support::create_user(&db, UserRole::Passenger, true).await;
        let car = test_support::create_car(&db, owner.id, 1000.0, None).await;

        let pending = completed_rental(&db, car.id, renter.id, BookingStatus::Pending).await;
        let err = create_review(&db, &actor(&renter), review_of(pending.id, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let done = completed_rental(&db, car.id, renter.id, BookingStatus::Completed).await;
        let err = create_review(&db, &actor(&owner), review_of(done.id, 4))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn listing_pages_and_averages_over_all_reviews() {
        let db = test_support::setup_db().await;
        let owner = test_support::create_user(&db, UserRole::Driver, true).await;
        let car = test_support::create_car(&db, owner.id, 1000.0, None).await;

        for rating in [5, 4, 4] {
            let renter = test_support::create_user(&db, UserRole::Passenger, true).await;
            let booking = completed_rental(&db, car.id, renter.id, BookingStatus::Completed).await;
            create_review(&db, &actor(&renter), review_of(booking.id, rating))
                .await
                .unwrap();
        }

        let page = list_car_reviews(
            &db,
            car.id,
            ReviewQuery {
                page: Some(2),
                page_size: Some(2),
            },
        )
        .await
        .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.reviews.len(), 1);
        assert_eq!(page.average_rating, Some(4.3));

        let err = list_car_reviews(
            &db,
            car.id,
            ReviewQuery {
                page: Some(u64::MAX),
                page_size: Some(MAX_PAGE_SIZE),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let empty = test_support::create_car(&db, owner.id, 500.0, None).await;
        let page = list_car_reviews(&db, empty.id, ReviewQuery::default()).await.unwrap();
        assert_eq!(page.average_rating, None);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
    }
}
