use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{found, ServiceError};
use crate::api::departments::{AddUserToDepartment, CreateDepartment, MoveDepartment, UpdateDepartment};
use crate::database::models::{
    Department, DepartmentDetail, DepartmentRef, OrgUnit, UserHierarchy, UserNode, UserSummary, DEPARTMENT_COLUMNS,
    USER_SUMMARY_COLUMNS,
};
use crate::hierarchy::{build_tree, HierarchyManager, PgDepartmentStore, TreeNode};
use crate::ordering::Reorderer;

/// Members of a department are listed head first, then managers, then by sort order
const MEMBER_ORDER: &str = "is_department_head DESC, is_manager DESC, sort_order, first_name";

/// Levels of subordinates returned under a department head
const REPORTING_DEPTH: usize = 2;

pub struct DepartmentService {
    pool: PgPool,
    hierarchy: HierarchyManager,
}

impl DepartmentService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hierarchy: HierarchyManager::new(Reorderer::from_config()),
        }
    }

    pub async fn create(&self, dto: CreateDepartment) -> Result<Department, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let node = {
            let mut store = PgDepartmentStore::new(&mut tx);
            self.hierarchy
                .create(&mut store, dto.parent_id, dto.position, &dto.details())
                .await?
        };
        let department = fetch_department(&mut tx, node.id).await?;
        tx.commit().await?;
        Ok(department)
    }

    /// Every department, shallowest first, siblings by position
    pub async fn list(&self) -> Result<Vec<Department>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM departments d ORDER BY d.level, d.parent_id NULLS FIRST, d.position",
            DEPARTMENT_COLUMNS
        );
        let departments = sqlx::query_as::<_, Department>(&sql).fetch_all(&self.pool).await?;
        Ok(departments)
    }

    /// The whole department forest, nested, with the members of each department
    pub async fn organizational_structure(&self) -> Result<Vec<TreeNode<OrgUnit>>, ServiceError> {
        let departments = self.list().await?;

        let sql = format!(
            "SELECT {} FROM users WHERE department_id IS NOT NULL AND is_active ORDER BY {}",
            USER_SUMMARY_COLUMNS, MEMBER_ORDER
        );
        let users = sqlx::query_as::<_, UserSummary>(&sql).fetch_all(&self.pool).await?;

        let mut members: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for user in users {
            if let Some(department) = user.department_id {
                members.entry(department).or_default().push(user);
            }
        }

        let units = departments
            .into_iter()
            .map(|department| OrgUnit {
                users: members.remove(&department.id).unwrap_or_default(),
                department,
            })
            .collect();
        Ok(build_tree(units))
    }

    pub async fn get(&self, id: Uuid) -> Result<DepartmentDetail, ServiceError> {
        let sql = format!("SELECT {} FROM departments d WHERE d.id = $1", DEPARTMENT_COLUMNS);
        let department = sqlx::query_as::<_, Department>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let department = found(department, "Department", id)?;

        let parent = match department.parent_id {
            Some(parent_id) => {
                sqlx::query_as::<_, DepartmentRef>("SELECT id, name FROM departments WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };

        let sql = format!(
            "SELECT {} FROM departments d WHERE d.parent_id = $1 ORDER BY d.position",
            DEPARTMENT_COLUMNS
        );
        let children = sqlx::query_as::<_, Department>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM users WHERE department_id = $1 ORDER BY {}",
            USER_SUMMARY_COLUMNS, MEMBER_ORDER
        );
        let users = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM users WHERE managed_department_id = $1 ORDER BY {}",
            USER_SUMMARY_COLUMNS, MEMBER_ORDER
        );
        let managers = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(DepartmentDetail {
            department,
            parent,
            children,
            users,
            managers,
        })
    }

    /// A `parentId` key (including `null`) or a `position` moves the
    /// department before the descriptive fields are written.
    pub async fn update(&self, id: Uuid, dto: UpdateDepartment) -> Result<Department, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let current = fetch_department(&mut tx, id).await?;

        if dto.parent_id.is_some() || dto.position.is_some() {
            let parent = dto.parent_id.unwrap_or(current.parent_id);
            let mut store = PgDepartmentStore::new(&mut tx);
            self.hierarchy
                .move_node(&mut store, id, parent, dto.position)
                .await?;
        }

        sqlx::query(
            "UPDATE departments SET name = COALESCE($2, name), description = COALESCE($3, description), \
             color = COALESCE($4, color), icon = COALESCE($5, icon), is_active = COALESCE($6, is_active), \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(&dto.description)
        .bind(&dto.color)
        .bind(&dto.icon)
        .bind(dto.is_active)
        .execute(&mut *tx)
        .await?;

        let department = fetch_department(&mut tx, id).await?;
        tx.commit().await?;
        Ok(department)
    }

    pub async fn move_department(&self, id: Uuid, dto: MoveDepartment) -> Result<Department, ServiceError> {
        let mut tx = self.pool.begin().await?;
        {
            let mut store = PgDepartmentStore::new(&mut tx);
            self.hierarchy
                .move_node(&mut store, id, dto.new_parent_id, dto.new_position)
                .await?;
        }
        let department = fetch_department(&mut tx, id).await?;
        tx.commit().await?;
        Ok(department)
    }

    /// Only leaf departments without members can be deleted
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        {
            let mut store = PgDepartmentStore::new(&mut tx);
            self.hierarchy.remove(&mut store, id).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Place a user in a department. Making them head fails while another user heads it.
    pub async fn add_user(&self, dto: AddUserToDepartment) -> Result<UserSummary, ServiceError> {
        let mut tx = self.pool.begin().await?;
        fetch_department(&mut tx, dto.department_id).await?;
        fetch_user(&mut tx, dto.user_id).await?;

        if dto.is_department_head {
            let head = {
                let mut store = PgDepartmentStore::new(&mut tx);
                self.hierarchy.current_head(&mut store, dto.department_id).await?
            };
            if head.is_some_and(|head| head != dto.user_id) {
                return Err(ServiceError::Conflict(
                    "This department already has a head; remove the current head first".to_string(),
                ));
            }
        }
        if let Some(manager) = dto.manager_id {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(manager)
                .fetch_one(&mut *tx)
                .await?;
            if !exists {
                return Err(ServiceError::not_found("Manager", manager));
            }
        }

        let sql = format!(
            "UPDATE users SET department_id = $2, job_title = $3, is_manager = $4, is_department_head = $5, \
             managed_department_id = CASE WHEN $5 THEN $2 ELSE managed_department_id END, manager_id = $6, \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_SUMMARY_COLUMNS
        );
        let user = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(dto.user_id)
            .bind(dto.department_id)
            .bind(&dto.job_title)
            .bind(dto.is_manager)
            .bind(dto.is_department_head)
            .bind(dto.manager_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!("Added user {} to department {}", user.id, dto.department_id);
        Ok(user)
    }

    /// Users who still manage someone must have their reports reassigned first
    pub async fn remove_user(&self, department_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        let member: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND department_id = $2)")
                .bind(user_id)
                .bind(department_id)
                .fetch_one(&mut *tx)
                .await?;
        if !member {
            return Err(ServiceError::NotFound(format!(
                "User {} not found in department {}",
                user_id, department_id
            )));
        }

        let subordinates: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE manager_id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if subordinates > 0 {
            return Err(ServiceError::BadRequest(format!(
                "User has {} subordinates; reassign them before removing the user",
                subordinates
            )));
        }

        sqlx::query(
            "UPDATE users SET department_id = NULL, job_title = NULL, is_manager = FALSE, \
             is_department_head = FALSE, managed_department_id = NULL, manager_id = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!("Removed user {} from department {}", user_id, department_id);
        Ok(())
    }

    pub async fn set_head(&self, department_id: Uuid, user_id: Uuid) -> Result<UserSummary, ServiceError> {
        let mut tx = self.pool.begin().await?;
        {
            let mut store = PgDepartmentStore::new(&mut tx);
            self.hierarchy.set_head(&mut store, department_id, user_id).await?;
        }
        let user = fetch_user(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// The head with two levels of reports, plus members reporting to nobody
    pub async fn user_hierarchy(&self, department_id: Uuid) -> Result<UserHierarchy, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let department = fetch_department(&mut tx, department_id).await?;

        let head_id = {
            let mut store = PgDepartmentStore::new(&mut tx);
            self.hierarchy.current_head(&mut store, department_id).await?
        };
        let head = match head_id {
            Some(id) => {
                let user = fetch_user(&mut tx, id).await?;
                Some(reporting_tree(&mut tx, user, REPORTING_DEPTH).await?)
            }
            None => None,
        };

        let sql = format!(
            "SELECT {} FROM users WHERE department_id = $1 AND manager_id IS NULL AND NOT is_department_head \
             ORDER BY {}",
            USER_SUMMARY_COLUMNS, MEMBER_ORDER
        );
        let users_without_manager = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(department_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(UserHierarchy {
            department,
            head,
            users_without_manager,
        })
    }
}

async fn fetch_department(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Department, ServiceError> {
    let sql = format!("SELECT {} FROM departments d WHERE d.id = $1", DEPARTMENT_COLUMNS);
    let department = sqlx::query_as::<_, Department>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    found(department, "Department", id)
}

async fn fetch_user(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<UserSummary, ServiceError> {
    let sql = format!("SELECT {} FROM users WHERE id = $1", USER_SUMMARY_COLUMNS);
    let user = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    found(user, "User", id)
}

/// `root` and the users reporting to it, `depth` levels down, breadth first
async fn reporting_tree(
    tx: &mut Transaction<'_, Postgres>,
    root: UserSummary,
    depth: usize,
) -> Result<UserNode, ServiceError> {
    let sql = format!(
        "SELECT {} FROM users WHERE manager_id = ANY($1) ORDER BY {}",
        USER_SUMMARY_COLUMNS, MEMBER_ORDER
    );

    // Each level is fetched in one query; levels[i] holds the users at depth i
    let mut levels: Vec<Vec<UserSummary>> = vec![vec![root]];
    for _ in 0..depth {
        let Some(last) = levels.last() else { break };
        let ids: Vec<Uuid> = last.iter().map(|u| u.id).collect();
        let next = sqlx::query_as::<_, UserSummary>(&sql)
            .bind(&ids)
            .fetch_all(&mut **tx)
            .await?;
        if next.is_empty() {
            break;
        }
        levels.push(next);
    }

    // Fold bottom-up so every node owns its finished subordinates
    let mut below: HashMap<Uuid, Vec<UserNode>> = HashMap::new();
    while let Some(level) = levels.pop() {
        let mut built: HashMap<Uuid, Vec<UserNode>> = HashMap::new();
        for user in level {
            let node = UserNode {
                subordinates: below.remove(&user.id).unwrap_or_default(),
                user,
            };
            if levels.is_empty() {
                return Ok(node);
            }
            if let Some(manager) = node.user.manager_id {
                built.entry(manager).or_default().push(node);
            }
        }
        below = built;
    }
    Err(ServiceError::NotFound("Department head".to_string()))
}
